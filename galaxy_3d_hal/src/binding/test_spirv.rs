//! Minimal SPIR-V module assembler for tests (no shader compiler required)

use super::spirv::SPIRV_MAGIC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutionModel {
    Vertex,
    Fragment,
    GLCompute,
}

impl ExecutionModel {
    fn word(self) -> u32 {
        match self {
            ExecutionModel::Vertex => 0,
            ExecutionModel::Fragment => 4,
            ExecutionModel::GLCompute => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TestKind {
    UniformBuffer,
    StorageBuffer,
    /// Storage buffer whose only member is `NonWritable`
    ReadOnlyStorageBuffer,
    /// Combined image sampler: (dim, arrayed, multisampled)
    CombinedImage(u32, bool, bool),
    /// Separate sampled image: (dim, arrayed, multisampled)
    SeparateImage(u32, bool, bool),
    StorageImage(u32),
    Sampler,
    UniformTexelBuffer,
}

#[derive(Debug, Clone)]
pub(crate) struct TestResource {
    pub name: &'static str,
    pub kind: TestKind,
    pub set: u32,
    pub binding: u32,
    /// None = not an array, Some(0) = runtime array
    pub array: Option<u32>,
}

impl TestResource {
    pub fn new(name: &'static str, kind: TestKind, set: u32, binding: u32) -> Self {
        Self { name, kind, set, binding, array: None }
    }

    pub fn array(mut self, size: u32) -> Self {
        self.array = Some(size);
        self
    }
}

fn string_words(s: &str) -> Vec<u32> {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes
        .chunks(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn inst(out: &mut Vec<u32>, opcode: u32, operands: &[u32]) {
    out.push(((operands.len() as u32 + 1) << 16) | opcode);
    out.extend_from_slice(operands);
}

/// Assemble a module with one entry point `main` declaring `resources`
pub(crate) fn build_module(model: ExecutionModel, resources: &[TestResource]) -> Vec<u32> {
    let mut next_id = 1u32;
    let mut id = || {
        let value = next_id;
        next_id += 1;
        value
    };

    let void_ty = id();
    let fn_ty = id();
    let float_ty = id();
    let uint_ty = id();
    let main_fn = id();
    let label = id();

    let mut debug = Vec::new();
    let mut annotations = Vec::new();
    let mut types = Vec::new();

    inst(&mut types, 19, &[void_ty]);
    inst(&mut types, 33, &[fn_ty, void_ty]);
    inst(&mut types, 22, &[float_ty, 32]);
    inst(&mut types, 21, &[uint_ty, 32, 0]);

    let mut name_operands = vec![main_fn];
    name_operands.extend(string_words("main"));
    inst(&mut debug, 5, &name_operands);

    for resource in resources {
        let (element_ty, storage_class) = match resource.kind {
            TestKind::UniformBuffer | TestKind::StorageBuffer | TestKind::ReadOnlyStorageBuffer => {
                let block = id();
                inst(&mut types, 30, &[block, float_ty]);
                let mut block_name = vec![block];
                block_name.extend(string_words(&format!("{}Block", resource.name)));
                inst(&mut debug, 5, &block_name);
                inst(&mut annotations, 71, &[block, 2]);
                inst(&mut annotations, 72, &[block, 0, 35, 0]);
                if resource.kind == TestKind::ReadOnlyStorageBuffer {
                    inst(&mut annotations, 72, &[block, 0, 24]);
                }
                let storage = if resource.kind == TestKind::UniformBuffer { 2 } else { 12 };
                (block, storage)
            }
            TestKind::CombinedImage(dim, arrayed, ms) => {
                let image = id();
                inst(&mut types, 25, &[image, float_ty, dim, 0, arrayed as u32, ms as u32, 1, 0]);
                let sampled = id();
                inst(&mut types, 27, &[sampled, image]);
                (sampled, 0)
            }
            TestKind::SeparateImage(dim, arrayed, ms) => {
                let image = id();
                inst(&mut types, 25, &[image, float_ty, dim, 0, arrayed as u32, ms as u32, 1, 0]);
                (image, 0)
            }
            TestKind::StorageImage(dim) => {
                let image = id();
                inst(&mut types, 25, &[image, float_ty, dim, 0, 0, 0, 2, 4]);
                (image, 0)
            }
            TestKind::UniformTexelBuffer => {
                let image = id();
                inst(&mut types, 25, &[image, float_ty, 5, 0, 0, 0, 1, 0]);
                (image, 0)
            }
            TestKind::Sampler => {
                let sampler = id();
                inst(&mut types, 26, &[sampler]);
                (sampler, 0)
            }
        };

        let var_ty = match resource.array {
            None => element_ty,
            Some(0) => {
                let array = id();
                inst(&mut types, 29, &[array, element_ty]);
                array
            }
            Some(size) => {
                let length = id();
                inst(&mut types, 43, &[uint_ty, length, size]);
                let array = id();
                inst(&mut types, 28, &[array, element_ty, length]);
                array
            }
        };

        let pointer = id();
        inst(&mut types, 32, &[pointer, storage_class, var_ty]);
        let var = id();
        inst(&mut types, 59, &[pointer, var, storage_class]);

        let mut var_name = vec![var];
        var_name.extend(string_words(resource.name));
        inst(&mut debug, 5, &var_name);
        inst(&mut annotations, 71, &[var, 34, resource.set]);
        inst(&mut annotations, 71, &[var, 33, resource.binding]);
    }

    let bound = next_id;

    let mut words = vec![SPIRV_MAGIC, 0x0001_0300, 0, bound, 0];
    inst(&mut words, 17, &[1]);
    inst(&mut words, 14, &[0, 1]);
    let mut entry = vec![model.word(), main_fn];
    entry.extend(string_words("main"));
    inst(&mut words, 15, &entry);
    if model == ExecutionModel::Fragment {
        inst(&mut words, 16, &[main_fn, 7]);
    } else if model == ExecutionModel::GLCompute {
        inst(&mut words, 16, &[main_fn, 17, 1, 1, 1]);
    }
    words.extend(debug);
    words.extend(annotations);
    words.extend(types);
    inst(&mut words, 54, &[void_ty, main_fn, 0, fn_ty]);
    inst(&mut words, 248, &[label]);
    inst(&mut words, 253, &[]);
    inst(&mut words, 56, &[]);
    words
}
