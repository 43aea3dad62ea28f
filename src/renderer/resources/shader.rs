use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;

/// A compiled SPIR-V module bound to the pipeline stage it runs in
pub struct ShaderModule {
    pub module: vk::ShaderModule,
    pub stage: vk::ShaderStageFlags,
    pub path: PathBuf,
    device: Arc<ash::Device>,
}

impl ShaderModule {
    pub fn new(
        path: impl AsRef<Path>,
        stage: vk::ShaderStageFlags,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let code = read_spirv(path)?;

        let shader_module_info = vk::ShaderModuleCreateInfo::default()
            .code(&code);
        let module = unsafe {
            device
                .create_shader_module(&shader_module_info, None)
                .wrap_err_with(|| format!("Failed to create shader module from {:?}", path))?
        };
        log::debug!("Loaded {:?} shader {:?}", stage, path);

        Ok(Self {
            module,
            stage,
            path: path.to_path_buf(),
            device,
        })
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Reads a SPIR-V binary into properly aligned words
pub fn read_spirv(path: &Path) -> Result<Vec<u32>> {
    let mut file = File::open(path)
        .wrap_err_with(|| format!("Failed to open shader {:?}", path))?;
    let code = ash::util::read_spv(&mut file)
        .wrap_err_with(|| format!("Shader {:?} is not valid SPIR-V", path))?;
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("meshview-{}-{}", std::process::id(), name))
    }

    #[test]
    fn reads_words_from_binary() {
        let path = temp_path("ok.spv");
        let words: [u32; 3] = [0x0723_0203, 0x0001_0000, 42];
        fs::write(&path, bytemuck::cast_slice::<u32, u8>(&words)).unwrap();

        let code = read_spirv(&path);
        fs::remove_file(&path).unwrap();

        assert_eq!(code.unwrap(), words);
    }

    #[test]
    fn rejects_truncated_binary() {
        let path = temp_path("truncated.spv");
        fs::write(&path, [0x03, 0x02, 0x23, 0x07, 0x00]).unwrap();

        let code = read_spirv(&path);
        fs::remove_file(&path).unwrap();

        assert!(code.is_err());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_spirv(Path::new("/no/such/shader.vert.spv")).unwrap_err();
        assert!(format!("{err}").contains("shader.vert.spv"));
    }
}
