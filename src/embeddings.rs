use crate::error::Result;
use crate::scoring::Embedder;

#[cfg(feature = "embeddings")]
mod bert {
    use log::info;
    use rust_bert::pipelines::sentence_embeddings::{
        SentenceEmbeddingsBuilder, SentenceEmbeddingsModel, SentenceEmbeddingsModelType,
    };
    use tch::Device;

    use crate::error::{Error, Result};
    use crate::scoring::Embedder;

    const BATCH_SIZE: usize = 64;

    /// all-MiniLM-L6-v2 sentence embeddings.
    pub struct BertEmbedder {
        model: SentenceEmbeddingsModel,
    }

    impl BertEmbedder {
        pub fn load() -> Result<Self> {
            info!("Loading sentence embedding model 'all-MiniLM-L6-v2' (this may take a moment)...");
            let model_type = SentenceEmbeddingsModelType::AllMiniLmL6V2;
            let model = SentenceEmbeddingsBuilder::remote(model_type)
                .with_device(Device::cuda_if_available())
                .create_model()
                .map_err(|e| Error::EmbeddingsUnavailable(e.to_string()))?;
            Ok(BertEmbedder { model })
        }
    }

    impl Embedder for BertEmbedder {
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for batch in texts.chunks(BATCH_SIZE) {
                let vectors = self
                    .model
                    .encode(batch)
                    .map_err(|e| Error::EmbeddingsUnavailable(e.to_string()))?;
                out.extend(vectors);
            }
            Ok(out)
        }
    }
}

/// The sentence embedding model, if this build has one.
#[cfg(feature = "embeddings")]
pub fn load_embedder() -> Result<Box<dyn Embedder>> {
    Ok(Box::new(bert::BertEmbedder::load()?))
}

#[cfg(not(feature = "embeddings"))]
pub fn load_embedder() -> Result<Box<dyn Embedder>> {
    Err(crate::error::Error::EmbeddingsUnavailable(
        "this binary was built without the `embeddings` feature".into(),
    ))
}
