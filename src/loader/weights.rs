use crate::error::{Error, Result};
use crate::loader::{ArtifactLayout, DevicePolicy, ModelLoader};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const WEIGHT_EXTENSIONS: [&str; 4] = ["safetensors", "pt", "pth", "bin"];

/// Named tensors of a raw state dict.
///
/// Only the parameters are restored; the caller builds the architecture that
/// consumes them, e.g. through [`Weights::var_builder`].
#[derive(Debug)]
pub struct Weights {
    tensors: HashMap<String, Tensor>,
    source: PathBuf,
    device: Device,
}

impl Weights {
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tensors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn parameter_count(&self) -> usize {
        self.tensors.values().map(Tensor::elem_count).sum()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn var_builder(self, dtype: DType) -> VarBuilder<'static> {
        VarBuilder::from_tensors(self.tensors, dtype, &self.device)
    }

    pub fn into_tensors(self) -> HashMap<String, Tensor> {
        self.tensors
    }
}

/// Loads safetensors or PyTorch pickle state dicts.
pub struct WeightsLoader {
    layout: ArtifactLayout,
    device: Device,
}

impl WeightsLoader {
    /// A single downloaded weights file.
    pub fn new(file: impl Into<PathBuf>, policy: DevicePolicy) -> Result<Self> {
        Ok(Self {
            layout: ArtifactLayout::file(file),
            device: policy.device()?,
        })
    }

    /// Weights shipped inside a zip archive, unpacking to `unpacked`.
    pub fn archived(
        archive: impl Into<PathBuf>,
        unpacked: impl Into<PathBuf>,
        policy: DevicePolicy,
    ) -> Result<Self> {
        Ok(Self {
            layout: ArtifactLayout::archive(archive, unpacked),
            device: policy.device()?,
        })
    }

    fn weights_file(&self, path: &Path) -> Result<PathBuf> {
        if !path.is_dir() {
            return Ok(path.to_path_buf());
        }

        let mut candidates: Vec<PathBuf> = fs::read_dir(path)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && has_weights_extension(p))
            .collect();
        candidates.sort();

        candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::rejected(self.name(), path, "no weights file in directory"))
    }
}

fn has_weights_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| WEIGHT_EXTENSIONS.contains(&ext))
}

impl ModelLoader for WeightsLoader {
    type Model = Weights;

    fn name(&self) -> &str {
        "weights"
    }

    fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    fn load(&self, path: &Path) -> Result<Weights> {
        let file = self.weights_file(path)?;
        tracing::warn!(
            "Loading a raw state dict from {:?}; the model architecture must be defined in code",
            file
        );

        let tensors = match file.extension().and_then(|ext| ext.to_str()) {
            Some("safetensors") => candle_core::safetensors::load(&file, &self.device)
                .map_err(|e| Error::rejected(self.name(), &file, e))?,
            Some("pt" | "pth" | "bin") => {
                let tensors = candle_core::pickle::read_all(&file)
                    .map_err(|e| Error::rejected(self.name(), &file, e))?;
                tensors
                    .into_iter()
                    .map(|(name, tensor)| Ok((name, tensor.to_device(&self.device)?)))
                    .collect::<candle_core::Result<HashMap<_, _>>>()
                    .map_err(|e| Error::rejected(self.name(), &file, e))?
            }
            Some("h5" | "hdf5") => {
                return Err(Error::rejected(
                    self.name(),
                    &file,
                    "HDF5 (Keras) weights are not supported; export them to .safetensors",
                ))
            }
            _ => {
                return Err(Error::rejected(
                    self.name(),
                    &file,
                    "unsupported weights format (expected .safetensors, .pt, .pth or .bin)",
                ))
            }
        };

        tracing::info!("Loaded {} tensors from {:?}", tensors.len(), file);

        Ok(Weights {
            tensors,
            source: file,
            device: self.device.clone(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn pickle_str(pkl: &mut Vec<u8>, value: &str) {
        pkl.push(b'X');
        pkl.extend_from_slice(&(value.len() as u32).to_le_bytes());
        pkl.extend_from_slice(value.as_bytes());
    }

    fn pickle_int(pkl: &mut Vec<u8>, value: usize) {
        pkl.push(b'J');
        pkl.extend_from_slice(&(value as i32).to_le_bytes());
    }

    fn pickle_ints(pkl: &mut Vec<u8>, values: &[usize]) {
        pkl.push(b'(');
        for value in values {
            pickle_int(pkl, *value);
        }
        pkl.push(b't');
    }

    /// Writes f32 tensors the way `torch.save(state_dict)` lays them out: a
    /// zip holding `archive/data.pkl` and one raw storage per tensor.
    pub(crate) fn write_torch_state_dict(path: &Path, tensors: &[(String, Tensor)]) {
        let mut pkl = vec![0x80, 2, b'}', b'('];
        let mut storages = Vec::new();

        for (index, (name, tensor)) in tensors.iter().enumerate() {
            let dims = tensor.dims().to_vec();
            let mut strides = vec![1usize; dims.len()];
            for i in (0..dims.len().saturating_sub(1)).rev() {
                strides[i] = strides[i + 1] * dims[i + 1];
            }
            let values = tensor.flatten_all().unwrap().to_vec1::<f32>().unwrap();

            pickle_str(&mut pkl, name);
            pkl.extend_from_slice(b"ctorch._utils\n_rebuild_tensor_v2\n(");
            pkl.push(b'(');
            pickle_str(&mut pkl, "storage");
            pkl.extend_from_slice(b"ctorch\nFloatStorage\n");
            pickle_str(&mut pkl, &index.to_string());
            pickle_str(&mut pkl, "cpu");
            pickle_int(&mut pkl, values.len());
            pkl.extend_from_slice(b"tQ");
            pickle_int(&mut pkl, 0);
            pickle_ints(&mut pkl, &dims);
            pickle_ints(&mut pkl, &strides);
            pkl.extend_from_slice(&[0x89, b'N', b't', b'R']);

            let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            storages.push((format!("archive/data/{}", index), bytes));
        }
        pkl.extend_from_slice(b"u.");

        let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file("archive/data.pkl", options).unwrap();
        zip.write_all(&pkl).unwrap();
        for (name, bytes) in storages {
            zip.start_file(name, options).unwrap();
            zip.write_all(&bytes).unwrap();
        }
        zip.finish().unwrap();
    }

    fn save_weights(path: &Path) {
        let mut tensors = HashMap::new();
        tensors.insert(
            "linear.weight".to_string(),
            Tensor::zeros((2, 3), DType::F32, &Device::Cpu).unwrap(),
        );
        tensors.insert(
            "linear.bias".to_string(),
            Tensor::ones(2, DType::F32, &Device::Cpu).unwrap(),
        );
        candle_core::safetensors::save(&tensors, path).unwrap();
    }

    #[test]
    fn test_loads_safetensors_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.safetensors");
        save_weights(&path);

        let loader = WeightsLoader::new("model.safetensors", DevicePolicy::Cpu).unwrap();
        let weights = loader.load(&path).unwrap();

        assert_eq!(weights.names(), vec!["linear.bias", "linear.weight"]);
        assert_eq!(weights.parameter_count(), 8);
        assert_eq!(weights.get("linear.weight").unwrap().dims(), &[2, 3]);
    }

    #[test]
    fn test_loads_first_weights_file_in_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("README.md"), "weights").unwrap();
        save_weights(&dir.path().join("model.safetensors"));

        let loader = WeightsLoader::archived("model.zip", "out", DevicePolicy::Cpu).unwrap();
        let weights = loader.load(dir.path()).unwrap();

        assert_eq!(weights.len(), 2);
        assert!(weights.source().ends_with("model.safetensors"));
    }

    #[test]
    fn test_loads_pytorch_state_dict() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.pt");
        let weight = Tensor::new(&[[1f32, 2., 3.], [4., 5., 6.]], &Device::Cpu).unwrap();
        let bias = Tensor::new(&[0.5f32, -0.5], &Device::Cpu).unwrap();
        write_torch_state_dict(
            &path,
            &[
                ("linear.weight".to_string(), weight),
                ("linear.bias".to_string(), bias),
            ],
        );

        let loader = WeightsLoader::new("model.pt", DevicePolicy::Cpu).unwrap();
        let weights = loader.load(&path).unwrap();

        assert_eq!(weights.names(), vec!["linear.bias", "linear.weight"]);
        let weight = weights.get("linear.weight").unwrap();
        assert_eq!(weight.dims(), &[2, 3]);
        assert_eq!(
            weight.to_vec2::<f32>().unwrap(),
            vec![vec![1., 2., 3.], vec![4., 5., 6.]]
        );
        assert_eq!(weights.get("linear.bias").unwrap().to_vec1::<f32>().unwrap(), vec![0.5, -0.5]);
    }

    #[test]
    fn test_rejects_corrupt_pytorch_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"not a zip").unwrap();

        let loader = WeightsLoader::new("model.bin", DevicePolicy::Cpu).unwrap();
        assert!(matches!(loader.load(&path), Err(Error::LoaderRejected { .. })));
    }

    #[test]
    fn test_rejects_unknown_format_and_garbage() {
        let dir = TempDir::new().unwrap();
        let loader = WeightsLoader::new("model.h5", DevicePolicy::Cpu).unwrap();

        let h5 = dir.path().join("model.h5");
        std::fs::write(&h5, b"\x89HDF").unwrap();
        let err = loader.load(&h5).unwrap_err();
        assert!(matches!(err, Error::LoaderRejected { .. }));
        assert!(err.to_string().contains("HDF5"), "{err}");

        let corrupt = dir.path().join("model.safetensors");
        std::fs::write(&corrupt, b"not tensors").unwrap();
        assert!(matches!(loader.load(&corrupt), Err(Error::LoaderRejected { .. })));
    }

    #[test]
    fn test_rejects_directory_without_weights() {
        let dir = TempDir::new().unwrap();
        let loader = WeightsLoader::archived("model.zip", "out", DevicePolicy::Cpu).unwrap();
        assert!(matches!(
            loader.load(dir.path()),
            Err(Error::LoaderRejected { .. })
        ));
    }
}
