use std::path::Path;

use crate::error::RenderError;

use vulkanalia::prelude::v1_0::*;

/// Reads a compiled SPIR-V file.
pub fn read_shader(path: impl AsRef<Path>) -> Result<Vec<u8>, RenderError> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|source| RenderError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// Reinterprets SPIR-V bytes as the 32-bit words Vulkan expects.
///
/// Copying into a `Vec<u32>` guarantees alignment whatever the
/// alignment of `bytecode`; only a length that is not a whole number
/// of words is rejected.
pub fn bytecode_words(bytecode: &[u8]) -> Result<Vec<u32>, RenderError> {
    if bytecode.len() % 4 != 0 {
        return Err(RenderError::ShaderAlignment(bytecode.len()));
    }

    Ok(bytecode
        .chunks_exact(4)
        .map(|w| u32::from_ne_bytes([w[0], w[1], w[2], w[3]]))
        .collect())
}

pub unsafe fn create_shader_module(
    device: &Device,
    bytecode: &[u8],
) -> Result<vk::ShaderModule, RenderError> {
    // Shader modules are thin wrappers around the bytecode. They are
    // only needed while the pipeline is being created.
    let code = bytecode_words(bytecode)?;
    let info = vk::ShaderModuleCreateInfo::builder()
        .code_size(bytecode.len())
        .code(&code);

    device
        .create_shader_module(&info, None)
        .map_err(RenderError::PipelineCreation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_keep_native_byte_order() {
        let magic = 0x0723_0203u32.to_ne_bytes();
        let mut bytes = magic.to_vec();
        bytes.extend_from_slice(&[0, 0, 1, 0]);

        let words = bytecode_words(&bytes).unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0], 0x0723_0203);
    }

    #[test]
    fn partial_words_are_rejected() {
        assert!(matches!(
            bytecode_words(&[3, 2, 35, 7, 0]),
            Err(RenderError::ShaderAlignment(5))
        ));
    }

    #[test]
    fn missing_file_reports_its_path() {
        let error = read_shader("does/not/exist.spv").unwrap_err();
        match error {
            RenderError::ShaderLoad { path, .. } => assert_eq!(path, Path::new("does/not/exist.spv")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
