use crate::error::{Error, Result};
use crate::loader::tokenizer::load_tokenizer;
use crate::loader::{ArtifactLayout, DevicePolicy, ModelLoader, DEFAULT_ARCHIVE};
use candle_core::{pickle, DType, Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, BertOnlyMLMHead, Config as BertConfig};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

const CONFIG_FILE: &str = "config.json";
const SAFETENSORS_FILE: &str = "model.safetensors";
const PYTORCH_FILE: &str = "pytorch_model.bin";

/// Mask tokens tried, in order, when filling a masked position.
const MASK_TOKENS: [&str; 2] = ["[MASK]", "<mask>"];
const FILL_MASK_TOP_K: usize = 5;

/// Dimensions reported by `config.json`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EncoderShape {
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
}

#[derive(Deserialize)]
struct LabelConfig {
    #[serde(default)]
    id2label: BTreeMap<String, String>,
}

/// Which head sits on top of the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformerTask {
    /// Bare encoder; weights are stored at the root (or under the model type).
    #[default]
    Encoder,
    /// `bert.*` encoder plus the `cls.predictions.*` language-modelling head.
    MaskedLm,
    /// `bert.*` encoder, `bert.pooler.dense` and a `classifier` projection.
    Classification,
}

impl fmt::Display for TransformerTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformerTask::Encoder => write!(f, "encoder"),
            TransformerTask::MaskedLm => write!(f, "masked-lm"),
            TransformerTask::Classification => write!(f, "classification"),
        }
    }
}

enum Head {
    Encoder,
    MaskedLm(BertOnlyMLMHead),
    Classification {
        pooler: Linear,
        classifier: Linear,
        labels: Vec<String>,
    },
}

/// A pretrained encoder together with its tokenizer and task head.
pub struct Transformer {
    tokenizer: Tokenizer,
    model: BertModel,
    head: Head,
    shape: EncoderShape,
    device: Device,
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformer")
            .field("task", &self.task())
            .field("shape", &self.shape)
            .field("device", &self.device)
            .finish()
    }
}

fn infer(e: candle_core::Error) -> Error {
    Error::InferenceFailed(e.to_string())
}

impl Transformer {
    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn model(&self) -> &BertModel {
        &self.model
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn shape(&self) -> EncoderShape {
        self.shape
    }

    pub fn task(&self) -> TransformerTask {
        match self.head {
            Head::Encoder => TransformerTask::Encoder,
            Head::MaskedLm(_) => TransformerTask::MaskedLm,
            Head::Classification { .. } => TransformerTask::Classification,
        }
    }

    /// Class labels of a classification head, ordered by id.
    pub fn labels(&self) -> &[String] {
        match &self.head {
            Head::Classification { labels, .. } => labels,
            _ => &[],
        }
    }

    fn encode(&self, sentence: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(sentence, true)
            .map_err(|e| Error::InferenceFailed(format!("Tokenization failed: {}", e)))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn hidden_states(&self, ids: &[u32]) -> Result<Tensor> {
        let input_ids = Tensor::new(ids, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(infer)?;
        let token_type_ids = input_ids.zeros_like().map_err(infer)?;

        self.model
            .forward(&input_ids, &token_type_ids, None)
            .map_err(infer)
    }

    /// Raw output of the model for one sentence:
    /// hidden states `(1, tokens, hidden_size)` for a bare encoder,
    /// vocabulary logits `(1, tokens, vocab_size)` for a masked LM,
    /// class logits `(1, labels)` for a classifier.
    pub fn predict(&self, sentence: &str) -> Result<Tensor> {
        let ids = self.encode(sentence)?;
        let hidden = self.hidden_states(&ids)?;

        match &self.head {
            Head::Encoder => Ok(hidden),
            Head::MaskedLm(cls) => cls.forward(&hidden).map_err(infer),
            Head::Classification {
                pooler, classifier, ..
            } => classification_logits(&hidden, pooler, classifier),
        }
    }

    /// Mean-pooled sentence vector.
    pub fn embed(&self, sentence: &str) -> Result<Vec<f32>> {
        let ids = self.encode(sentence)?;
        let hidden = self.hidden_states(&ids)?;

        hidden
            .mean(1)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_dtype(DType::F32))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(|e| Error::InferenceFailed(format!("Pooling failed: {}", e)))
    }

    /// Appends the mask token to `sentence` and returns the most likely
    /// fillers with their probabilities, best first.
    pub fn fill_mask(&self, sentence: &str) -> Result<Vec<(String, f32)>> {
        let Head::MaskedLm(cls) = &self.head else {
            return Err(Error::InferenceFailed(format!(
                "fill-mask needs a masked-lm head, this model is a {}",
                self.task()
            )));
        };

        let (mask, mask_id) = MASK_TOKENS
            .iter()
            .find_map(|token| self.tokenizer.token_to_id(token).map(|id| (*token, id)))
            .ok_or_else(|| Error::InferenceFailed("Tokenizer has no mask token".to_string()))?;

        let ids = self.encode(&format!("{}{}", sentence, mask))?;
        let position = ids
            .iter()
            .rposition(|&id| id == mask_id)
            .ok_or_else(|| Error::InferenceFailed(format!("{} was dropped by the tokenizer", mask)))?;

        let hidden = self.hidden_states(&ids)?;
        let probabilities = cls
            .forward(&hidden)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.get(position))
            .and_then(|t| candle_nn::ops::softmax(&t, 0))
            .and_then(|t| t.to_dtype(DType::F32))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(infer)?;

        let mut ranked: Vec<(usize, f32)> = probabilities.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(ranked
            .into_iter()
            .filter_map(|(id, score)| {
                self.tokenizer
                    .id_to_token(id as u32)
                    .map(|token| (token, score))
            })
            .take(FILL_MASK_TOP_K)
            .collect())
    }

    /// Label of the highest-scoring class.
    pub fn classify(&self, sentence: &str) -> Result<String> {
        let Head::Classification { labels, .. } = &self.head else {
            return Err(Error::InferenceFailed(format!(
                "classification needs a classifier head, this model is a {}",
                self.task()
            )));
        };

        let best = self
            .predict(sentence)?
            .squeeze(0)
            .and_then(|t| t.argmax(0))
            .and_then(|t| t.to_scalar::<u32>())
            .map_err(infer)? as usize;

        labels
            .get(best)
            .cloned()
            .ok_or_else(|| Error::InferenceFailed(format!("No label for class {}", best)))
    }
}

/// `tanh(pooler(h[CLS]))` projected onto the classes.
fn classification_logits(hidden: &Tensor, pooler: &Linear, classifier: &Linear) -> Result<Tensor> {
    hidden
        .narrow(1, 0, 1)
        .and_then(|t| t.squeeze(1))
        .and_then(|t| pooler.forward(&t))
        .and_then(|t| t.tanh())
        .and_then(|t| classifier.forward(&t))
        .map_err(infer)
}

/// Loads a BERT-family checkpoint directory (`config.json`, `tokenizer.json`
/// and weights) unpacked from an archive.
pub struct TransformerLoader {
    layout: ArtifactLayout,
    device: Device,
    task: TransformerTask,
}

impl TransformerLoader {
    pub fn new(unpacked: impl Into<PathBuf>, policy: DevicePolicy) -> Result<Self> {
        Self::with_layout(ArtifactLayout::archive(DEFAULT_ARCHIVE, unpacked), policy)
    }

    pub fn with_layout(layout: ArtifactLayout, policy: DevicePolicy) -> Result<Self> {
        let device = policy.device()?;
        tracing::debug!("Transformer loader using device {:?}", device);
        Ok(Self {
            layout,
            device,
            task: TransformerTask::default(),
        })
    }

    pub fn with_task(mut self, task: TransformerTask) -> Self {
        self.task = task;
        self
    }

    pub fn task(&self) -> TransformerTask {
        self.task
    }

    fn read_config(&self, model_dir: &Path) -> Result<(BertConfig, EncoderShape, Vec<String>)> {
        let config_path = model_dir.join(CONFIG_FILE);
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| Error::rejected(self.name(), &config_path, e))?;

        let config: BertConfig = serde_json::from_str(&content)
            .map_err(|e| Error::rejected(self.name(), &config_path, e))?;
        let shape: EncoderShape = serde_json::from_str(&content)
            .map_err(|e| Error::rejected(self.name(), &config_path, e))?;
        let labels: LabelConfig = serde_json::from_str(&content)
            .map_err(|e| Error::rejected(self.name(), &config_path, e))?;

        let labels = ordered_labels(labels.id2label)
            .map_err(|reason| Error::rejected(self.name(), &config_path, reason))?;
        Ok((config, shape, labels))
    }

    /// Converts `pytorch_model.bin` to `model.safetensors` when only the former exists.
    fn ensure_safetensors(&self, model_dir: &Path) -> Result<PathBuf> {
        let safetensors_file = model_dir.join(SAFETENSORS_FILE);
        if safetensors_file.exists() {
            return Ok(safetensors_file);
        }

        let pytorch_file = model_dir.join(PYTORCH_FILE);
        if !pytorch_file.exists() {
            return Err(Error::rejected(
                self.name(),
                model_dir,
                format!("missing {} or {}", SAFETENSORS_FILE, PYTORCH_FILE),
            ));
        }

        tracing::info!("Converting {} to {}...", PYTORCH_FILE, SAFETENSORS_FILE);

        let tensors: HashMap<String, Tensor> = pickle::read_all(&pytorch_file)
            .map_err(|e| Error::rejected(self.name(), &pytorch_file, e))?
            .into_iter()
            .collect();

        candle_core::safetensors::save(&tensors, &safetensors_file)
            .map_err(|e| Error::rejected(self.name(), &safetensors_file, e))?;

        tracing::info!("Converted {} tensors", tensors.len());
        Ok(safetensors_file)
    }

    fn build(
        &self,
        vb: VarBuilder,
        config: &BertConfig,
        labels: Vec<String>,
    ) -> candle_core::Result<(BertModel, Head)> {
        match self.task {
            TransformerTask::Encoder => Ok((BertModel::load(vb, config)?, Head::Encoder)),
            TransformerTask::MaskedLm => {
                let model = BertModel::load(vb.pp("bert"), config)?;
                let cls = BertOnlyMLMHead::load(vb.pp("cls"), config)?;
                Ok((model, Head::MaskedLm(cls)))
            }
            TransformerTask::Classification => {
                let model = BertModel::load(vb.pp("bert"), config)?;
                let pooler = candle_nn::linear(
                    config.hidden_size,
                    config.hidden_size,
                    vb.pp("bert").pp("pooler").pp("dense"),
                )?;
                let classifier = candle_nn::linear(config.hidden_size, labels.len(), vb.pp("classifier"))?;
                Ok((
                    model,
                    Head::Classification {
                        pooler,
                        classifier,
                        labels,
                    },
                ))
            }
        }
    }
}

/// `id2label` keys are stringified ids; they must cover `0..n`.
fn ordered_labels(id2label: BTreeMap<String, String>) -> std::result::Result<Vec<String>, String> {
    let mut labels: Vec<(usize, String)> = id2label
        .into_iter()
        .map(|(id, label)| {
            id.parse::<usize>()
                .map(|id| (id, label))
                .map_err(|_| format!("id2label key '{}' is not a class id", id))
        })
        .collect::<std::result::Result<_, _>>()?;
    labels.sort_by_key(|(id, _)| *id);

    for (expected, (id, _)) in labels.iter().enumerate() {
        if *id != expected {
            return Err(format!("id2label has no entry for class {}", expected));
        }
    }

    Ok(labels.into_iter().map(|(_, label)| label).collect())
}

impl ModelLoader for TransformerLoader {
    type Model = Transformer;

    fn name(&self) -> &str {
        "transformer"
    }

    fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    fn load(&self, path: &Path) -> Result<Transformer> {
        if !path.is_dir() {
            return Err(Error::rejected(self.name(), path, "expected a model directory"));
        }

        let (config, shape, labels) = self.read_config(path)?;
        if self.task == TransformerTask::Classification && labels.is_empty() {
            return Err(Error::rejected(
                self.name(),
                &path.join(CONFIG_FILE),
                "a classifier needs id2label",
            ));
        }

        let tokenizer = load_tokenizer(self.name(), path)?;
        let weights = self.ensure_safetensors(path)?;

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[&weights], DType::F32, &self.device) }
            .map_err(|e| Error::rejected(self.name(), &weights, e))?;
        let (model, head) = self
            .build(vb, &config, labels)
            .map_err(|e| Error::rejected(self.name(), &weights, e))?;

        tracing::info!("Model loaded successfully ({})", self.task);
        tracing::info!("  Hidden size: {}", shape.hidden_size);
        tracing::info!("  Hidden layers: {}", shape.num_hidden_layers);
        tracing::info!("  Attention heads: {}", shape.num_attention_heads);

        Ok(Transformer {
            tokenizer,
            model,
            head,
            shape,
            device: self.device.clone(),
        })
    }
}
