/// Draw command arguments

/// Non-indexed draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawAttribs {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

impl DrawAttribs {
    pub fn new(vertex_count: u32) -> Self {
        Self {
            vertex_count,
            instance_count: 1,
            first_vertex: 0,
            first_instance: 0,
        }
    }

    pub fn instanced(mut self, instance_count: u32) -> Self {
        self.instance_count = instance_count;
        self
    }
}

/// Indexed draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawIndexedAttribs {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

impl DrawIndexedAttribs {
    pub fn new(index_count: u32) -> Self {
        Self {
            index_count,
            instance_count: 1,
            first_index: 0,
            base_vertex: 0,
            first_instance: 0,
        }
    }

    pub fn instanced(mut self, instance_count: u32) -> Self {
        self.instance_count = instance_count;
        self
    }
}
