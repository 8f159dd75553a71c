// ============================================================
// Layer 5 — Simple CNN
// ============================================================
// A small digit classifier:
//
//   [N,1,28,28]
//     conv 3x3 (1→32)  + ReLU   → [N,32,26,26]
//     conv 3x3 (32→64) + ReLU   → [N,64,24,24]
//     max-pool 2x2, stride 2    → [N,64,12,12]
//     flatten                   → [N,9216]
//     linear 9216→128 + ReLU
//     linear 128→10             → logits [N,10]

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        loss::CrossEntropyLossConfig,
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, Relu,
    },
    prelude::*,
};

/// Side length of the feature map after two valid 3x3 convs and one 2x2 pool.
const POOLED_SIDE: usize = 12;

#[derive(Config, Debug)]
pub struct SimpleCnnConfig {
    #[config(default = 10)]
    pub num_classes: usize,
    #[config(default = 32)]
    pub conv1_channels: usize,
    #[config(default = 64)]
    pub conv2_channels: usize,
    #[config(default = 128)]
    pub hidden_size: usize,
}

impl SimpleCnnConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SimpleCnn<B> {
        SimpleCnn {
            conv1: Conv2dConfig::new([1, self.conv1_channels], [3, 3]).init(device),
            conv2: Conv2dConfig::new([self.conv1_channels, self.conv2_channels], [3, 3]).init(device),
            pool:  MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            fc1:   LinearConfig::new(self.flattened_size(), self.hidden_size).init(device),
            fc2:   LinearConfig::new(self.hidden_size, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }

    pub fn flattened_size(&self) -> usize {
        self.conv2_channels * POOLED_SIDE * POOLED_SIDE
    }
}

#[derive(Module, Debug)]
pub struct SimpleCnn<B: Backend> {
    conv1:      Conv2d<B>,
    conv2:      Conv2d<B>,
    pool:       MaxPool2d,
    fc1:        Linear<B>,
    fc2:        Linear<B>,
    activation: Relu,
}

impl<B: Backend> SimpleCnn<B> {
    /// images: [batch, 1, 28, 28] → logits: [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.activation.forward(self.conv1.forward(images));
        let x = self.activation.forward(self.conv2.forward(x));
        let x = self.pool.forward(x);
        let x = x.flatten::<2>(1, 3);
        let x = self.activation.forward(self.fc1.forward(x));
        self.fc2.forward(x)
    }

    /// Cross-entropy loss against digit targets, plus the logits.
    pub fn forward_classification(
        &self,
        images:  Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), targets);
        (loss, logits)
    }
}
