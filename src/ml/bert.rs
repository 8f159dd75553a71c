// ============================================================
// Layer 5 — BERT Sentence Classifier
// ============================================================
// Encoder-only transformer with a classification head:
//
//   input_ids [B,L] ─► word + position + token-type embeddings
//                      └─ LayerNorm, dropout
//                  ─► N x encoder layer
//                      ├─ self-attention (padding masked)
//                      ├─ add & LayerNorm
//                      ├─ GELU feed-forward
//                      └─ add & LayerNorm
//                  ─► pooler: tanh(dense(h[CLS]))
//                  ─► dropout ─► linear ─► logits [B,num_labels]
//
// Field names follow the pretrained checkpoint layout closely
// enough that weight import only needs a handful of key
// remaps (see infra/pretrained.rs).

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig, Embedding, EmbeddingConfig, LayerNorm, LayerNormConfig, Linear,
        LinearConfig,
    },
    prelude::*,
    tensor::activation::gelu,
};

#[derive(Config, Debug)]
pub struct BertConfig {
    pub vocab_size:              usize,
    pub hidden_size:             usize,
    pub num_hidden_layers:       usize,
    pub num_attention_heads:     usize,
    pub intermediate_size:       usize,
    pub max_position_embeddings: usize,
    #[config(default = 2)]
    pub type_vocab_size: usize,
    #[config(default = 1e-12)]
    pub layer_norm_eps: f64,
    #[config(default = 0.1)]
    pub hidden_dropout_prob: f64,
    #[config(default = 0.1)]
    pub attention_probs_dropout_prob: f64,
    #[config(default = 2)]
    pub num_labels: usize,
}

impl BertConfig {
    /// bert-base-uncased geometry.
    pub fn base_uncased() -> Self {
        Self::new(30522, 768, 12, 12, 3072, 512)
    }

    pub fn init_encoder<B: Backend>(&self, device: &B::Device) -> BertEncoder<B> {
        let h = self.hidden_size;
        let norm = || LayerNormConfig::new(h).with_epsilon(self.layer_norm_eps).init(device);

        let embeddings = BertEmbeddings {
            word_embeddings:       EmbeddingConfig::new(self.vocab_size, h).init(device),
            position_embeddings:   EmbeddingConfig::new(self.max_position_embeddings, h).init(device),
            token_type_embeddings: EmbeddingConfig::new(self.type_vocab_size, h).init(device),
            layer_norm:            norm(),
            dropout:               DropoutConfig::new(self.hidden_dropout_prob).init(),
        };

        let layers = (0..self.num_hidden_layers)
            .map(|_| BertLayer {
                attention: MultiHeadAttentionConfig::new(h, self.num_attention_heads)
                    .with_dropout(self.attention_probs_dropout_prob)
                    .init(device),
                attention_norm: norm(),
                intermediate:   LinearConfig::new(h, self.intermediate_size).init(device),
                output:         LinearConfig::new(self.intermediate_size, h).init(device),
                output_norm:    norm(),
                dropout:        DropoutConfig::new(self.hidden_dropout_prob).init(),
            })
            .collect();

        BertEncoder {
            embeddings,
            layers,
            pooler: LinearConfig::new(h, h).init(device),
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> BertClassifier<B> {
        self.with_encoder(self.init_encoder(device), device)
    }

    /// Attach a fresh classification head to an existing encoder.
    pub fn with_encoder<B: Backend>(&self, bert: BertEncoder<B>, device: &B::Device) -> BertClassifier<B> {
        BertClassifier {
            bert,
            dropout:    DropoutConfig::new(self.hidden_dropout_prob).init(),
            classifier: LinearConfig::new(self.hidden_size, self.num_labels).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct BertEmbeddings<B: Backend> {
    pub word_embeddings:       Embedding<B>,
    pub position_embeddings:   Embedding<B>,
    pub token_type_embeddings: Embedding<B>,
    pub layer_norm:            LayerNorm<B>,
    pub dropout:               Dropout,
}

impl<B: Backend> BertEmbeddings<B> {
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        // Single-sentence input: every token is segment 0.
        let token_types = Tensor::<B, 2, Int>::zeros([batch_size, seq_len], &device);

        let x = self.word_embeddings.forward(input_ids)
            + self.position_embeddings.forward(positions)
            + self.token_type_embeddings.forward(token_types);
        self.dropout.forward(self.layer_norm.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct BertLayer<B: Backend> {
    pub attention:      MultiHeadAttention<B>,
    pub attention_norm: LayerNorm<B>,
    pub intermediate:   Linear<B>,
    pub output:         Linear<B>,
    pub output_norm:    LayerNorm<B>,
    pub dropout:        Dropout,
}

impl<B: Backend> BertLayer<B> {
    /// `padding`: [batch, seq_len], true where the position is padding.
    pub fn forward(&self, x: Tensor<B, 3>, padding: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attended = self.attention
            .forward(MhaInput::self_attn(x.clone()).mask_pad(padding))
            .context;
        let x = self.attention_norm.forward(x + self.dropout.forward(attended));

        let ff = self.output.forward(gelu(self.intermediate.forward(x.clone())));
        self.output_norm.forward(x + self.dropout.forward(ff))
    }
}

#[derive(Module, Debug)]
pub struct BertEncoder<B: Backend> {
    pub embeddings: BertEmbeddings<B>,
    pub layers:     Vec<BertLayer<B>>,
    pub pooler:     Linear<B>,
}

impl<B: Backend> BertEncoder<B> {
    /// Returns the pooled [CLS] representation, [batch, hidden].
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let padding = attention_mask.equal_elem(0);

        let mut x = self.embeddings.forward(input_ids);
        for layer in &self.layers {
            x = layer.forward(x, padding.clone());
        }

        let [batch_size, _, hidden] = x.dims();
        let cls = x.slice([0..batch_size, 0..1, 0..hidden]).reshape([batch_size, hidden]);
        self.pooler.forward(cls).tanh()
    }
}

#[derive(Module, Debug)]
pub struct BertClassifier<B: Backend> {
    pub bert:       BertEncoder<B>,
    pub dropout:    Dropout,
    pub classifier: Linear<B>,
}

impl<B: Backend> BertClassifier<B> {
    /// input_ids, attention_mask: [batch, seq_len] → logits: [batch, num_labels]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let pooled = self.bert.forward(input_ids, attention_mask);
        self.classifier.forward(self.dropout.forward(pooled))
    }

    pub fn forward_classification(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
        labels:         Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(input_ids, attention_mask);
        let loss = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), labels);
        (loss, logits)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    pub(crate) fn tiny_config() -> BertConfig {
        BertConfig::new(32, 8, 2, 2, 16, 16)
    }

    fn ids(rows: &[[i32; 6]]) -> Tensor<B, 2, Int> {
        let flat: Vec<i32> = rows.iter().flatten().copied().collect();
        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &Default::default()).reshape([rows.len(), 6])
    }

    #[test]
    fn logits_shape_follows_batch_and_labels() {
        let model: BertClassifier<B> = tiny_config().init(&Default::default());
        let input = ids(&[[1, 5, 6, 2, 0, 0], [1, 7, 2, 0, 0, 0]]);
        let mask  = ids(&[[1, 1, 1, 1, 0, 0], [1, 1, 1, 0, 0, 0]]);
        assert_eq!(model.forward(input, mask).dims(), [2, 2]);
    }

    #[test]
    fn padded_positions_do_not_change_logits() {
        let model: BertClassifier<B> = tiny_config().init(&Default::default());
        let mask = ids(&[[1, 1, 1, 0, 0, 0]]);

        let a: Vec<f32> = model.forward(ids(&[[1, 5, 2, 0, 0, 0]]), mask.clone())
            .into_data().iter::<f32>().collect();
        let b: Vec<f32> = model.forward(ids(&[[1, 5, 2, 17, 30, 9]]), mask)
            .into_data().iter::<f32>().collect();

        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-4, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn base_uncased_geometry() {
        let cfg = BertConfig::base_uncased();
        assert_eq!(cfg.hidden_size / cfg.num_attention_heads, 64);
        assert_eq!(cfg.num_labels, 2);
    }
}
