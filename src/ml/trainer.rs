// ============================================================
// Layer 5 — Training Loops
// ============================================================
// Train + evaluate loops for both classifiers using Burn's
// DataLoader and Adam.
//
//   - Training runs on an AutodiffBackend B
//   - model.valid() gives the model on B::InnerBackend, with
//     dropout disabled, for evaluation
//   - argmax(1) returns [batch, 1]; flatten before .equal()
//
// The digit loop prints the last batch loss per epoch and the
// test accuracy. The sentence loop decays the learning rate
// linearly to zero and logs every `logging_steps` steps.

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::{mnist_use_case::MnistTrainConfig, sentiment_use_case::SentimentTrainConfig};
use crate::data::{
    mnist::{MnistBatcher, MnistDataset},
    text_dataset::{SentimentBatcher, SentimentDataset},
};
use crate::infra::{checkpoint::CheckpointManager, metrics::{EpochMetrics, MetricsLogger}};
use crate::ml::{bert::BertClassifier, cnn::SimpleCnn, scoring::accuracy};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainReport {
    pub last_train_loss: f64,
    pub eval_loss:       f64,
    pub eval_accuracy:   f64,
}

/// Count argmax hits of `logits` [N, C] against `targets` [N].
fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let predicted = logits.argmax(1).flatten::<1>(0, 1);
    predicted.equal(targets).int().sum().into_scalar().elem::<i64>() as usize
}

fn note_best(m: &EpochMetrics, best_eval_loss: &mut f64) {
    if m.is_improvement(*best_eval_loss) {
        *best_eval_loss = m.eval_loss;
        tracing::info!("Epoch {} has the best eval loss so far ({:.4})", m.epoch, m.eval_loss);
    }
}

fn mean(sum: f64, count: usize) -> f64 {
    if count > 0 { sum / count as f64 } else { f64::NAN }
}

// ─── Digits ───────────────────────────────────────────────────────────────────

pub fn train_mnist<B: AutodiffBackend>(
    cfg:      &MnistTrainConfig,
    mut model: SimpleCnn<B>,
    train:    MnistDataset,
    test:     MnistDataset,
    ckpt:     &CheckpointManager,
    metrics:  &MetricsLogger,
    device:   B::Device,
) -> Result<(SimpleCnn<B>, TrainReport)> {
    let mut optim = AdamConfig::new().init();

    let train_loader = DataLoaderBuilder::new(MnistBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(cfg.num_workers)
        .build(train);

    let test_loader = DataLoaderBuilder::new(MnistBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(cfg.eval_batch_size)
        .num_workers(cfg.num_workers)
        .build(test);

    let mut report = TrainReport { last_train_loss: f64::NAN, eval_loss: f64::NAN, eval_accuracy: 0.0 };
    let mut best_eval_loss = f64::INFINITY;

    for epoch in 1..=cfg.epochs {
        let mut loss_sum = 0.0f64;
        let mut batches  = 0usize;

        for batch in train_loader.iter() {
            let (loss, _) = model.forward_classification(batch.images, batch.targets);

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            report.last_train_loss = loss_val;
            loss_sum += loss_val;
            batches  += 1;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
        }
        println!("epoch {} done, loss={:.4}", epoch, report.last_train_loss);

        // ── Evaluation on the held-out split ──────────────────────────────────
        let model_valid = model.valid();
        let mut eval_sum = 0.0f64;
        let mut eval_batches = 0usize;
        let mut correct = 0usize;
        let mut total   = 0usize;

        for batch in test_loader.iter() {
            total += batch.targets.dims()[0];
            let (loss, logits) = model_valid.forward_classification(batch.images, batch.targets.clone());
            eval_sum += loss.into_scalar().elem::<f64>();
            eval_batches += 1;
            correct += count_correct(logits, batch.targets);
        }

        report.eval_loss     = mean(eval_sum, eval_batches);
        report.eval_accuracy = accuracy(correct, total);

        let epoch_metrics = EpochMetrics::new(epoch, mean(loss_sum, batches), report.eval_loss, report.eval_accuracy);
        note_best(&epoch_metrics, &mut best_eval_loss);
        metrics.log(&epoch_metrics)?;
        ckpt.save_model::<B, _>(&model, epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    println!("Test accuracy (Burn): {:.4}", report.eval_accuracy);
    Ok((model, report))
}

// ─── Sentences ────────────────────────────────────────────────────────────────

/// Learning rate after `step` of `total` steps, decaying linearly to 0.
pub fn linear_decay(base_lr: f64, step: usize, total: usize) -> f64 {
    if total == 0 {
        return base_lr;
    }
    base_lr * (total.saturating_sub(step)) as f64 / total as f64
}

/// Adam for fine-tuning: eps 1e-8 and gradients clipped to a global norm of 1.0.
fn sentiment_optimizer() -> AdamConfig {
    AdamConfig::new()
        .with_epsilon(1e-8)
        .with_grad_clipping(Some(GradientClippingConfig::Norm(1.0)))
}

pub fn train_sentiment<B: AutodiffBackend>(
    cfg:       &SentimentTrainConfig,
    mut model: BertClassifier<B>,
    train:     SentimentDataset,
    eval:      SentimentDataset,
    ckpt:      &CheckpointManager,
    metrics:   &MetricsLogger,
    device:    B::Device,
) -> Result<(BertClassifier<B>, TrainReport)> {
    use burn::data::dataset::Dataset;

    let steps_per_epoch = train.len().div_ceil(cfg.batch_size.max(1));
    let total_steps     = steps_per_epoch * cfg.epochs;
    tracing::info!("{} optimisation steps ({} per epoch)", total_steps, steps_per_epoch);

    let mut optim = sentiment_optimizer().init();

    let train_loader = DataLoaderBuilder::new(SentimentBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(cfg.num_workers)
        .build(train);

    let eval_loader = DataLoaderBuilder::new(SentimentBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(cfg.eval_batch_size)
        .num_workers(cfg.num_workers)
        .build(eval);

    let mut report = TrainReport { last_train_loss: f64::NAN, eval_loss: f64::NAN, eval_accuracy: 0.0 };
    let mut best_eval_loss = f64::INFINITY;
    let mut step = 0usize;

    for epoch in 1..=cfg.epochs {
        let mut loss_sum    = 0.0f64;
        let mut batches     = 0usize;
        let mut window_sum  = 0.0f64;
        let mut window_size = 0usize;

        for batch in train_loader.iter() {
            let (loss, _) = model.forward_classification(batch.input_ids, batch.attention_mask, batch.labels);

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            report.last_train_loss = loss_val;
            loss_sum    += loss_val;
            batches     += 1;
            window_sum  += loss_val;
            window_size += 1;

            let lr = linear_decay(cfg.lr, step, total_steps);
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);
            step += 1;

            if cfg.logging_steps > 0 && step % cfg.logging_steps == 0 {
                tracing::info!(
                    "step {}/{} | loss={:.4} | lr={:.3e} | epoch={:.2}",
                    step, total_steps, window_sum / window_size as f64, lr,
                    step as f64 / steps_per_epoch.max(1) as f64,
                );
                window_sum  = 0.0;
                window_size = 0;
            }
        }

        let model_valid = model.valid();
        let mut eval_sum = 0.0f64;
        let mut eval_batches = 0usize;
        let mut correct = 0usize;
        let mut total   = 0usize;

        for batch in eval_loader.iter() {
            total += batch.labels.dims()[0];
            let (loss, logits) = model_valid.forward_classification(
                batch.input_ids, batch.attention_mask, batch.labels.clone(),
            );
            eval_sum += loss.into_scalar().elem::<f64>();
            eval_batches += 1;
            correct += count_correct(logits, batch.labels);
        }

        report.eval_loss     = mean(eval_sum, eval_batches);
        report.eval_accuracy = accuracy(correct, total);
        let train_loss = mean(loss_sum, batches);

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | eval_loss={:.4} | eval_accuracy={:.4}",
            epoch, cfg.epochs, train_loss, report.eval_loss, report.eval_accuracy,
        );

        let epoch_metrics = EpochMetrics::new(epoch, train_loss, report.eval_loss, report.eval_accuracy);
        note_best(&epoch_metrics, &mut best_eval_loss);
        metrics.log(&epoch_metrics)?;
        ckpt.save_model::<B, _>(&model, epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    Ok((model, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    use crate::data::{
        encoding::{frame, SpecialTokens},
        mnist::{MnistSample, IMAGE_PIXELS},
        text_dataset::SentimentSample,
    };
    use crate::ml::{bert::tests::tiny_config, cnn::SimpleCnnConfig};

    type B = Autodiff<NdArray>;

    #[test]
    fn linear_decay_reaches_zero() {
        assert_eq!(linear_decay(1.0, 0, 4), 1.0);
        assert_eq!(linear_decay(1.0, 2, 4), 0.5);
        assert_eq!(linear_decay(1.0, 4, 4), 0.0);
        assert_eq!(linear_decay(1.0, 9, 4), 0.0);
        assert_eq!(linear_decay(0.3, 0, 0), 0.3);
    }

    #[test]
    fn fine_tuning_clips_gradient_norm() {
        let cfg = sentiment_optimizer();
        assert_eq!(cfg.epsilon, 1e-8);
        assert!(
            matches!(cfg.grad_clipping, Some(GradientClippingConfig::Norm(n)) if n == 1.0),
            "{:?}", cfg.grad_clipping
        );
    }

    fn digits(n: usize) -> Vec<MnistSample> {
        (0..n)
            .map(|i| MnistSample { pixels: vec![i as f32 * 0.1; IMAGE_PIXELS], label: (i % 10) as u8 })
            .collect()
    }

    #[test]
    fn mnist_epoch_writes_checkpoint_and_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_string_lossy().to_string();

        let mut cfg = MnistTrainConfig::default();
        cfg.batch_size = 2;
        cfg.eval_batch_size = 3;

        let device = Default::default();
        let model: SimpleCnn<B> = SimpleCnnConfig::new().init(&device);
        let ckpt    = CheckpointManager::new(&out);
        let metrics = MetricsLogger::new(&out).unwrap();

        let (_, report) = train_mnist(
            &cfg, model,
            MnistDataset::new(digits(4)), MnistDataset::new(digits(3)),
            &ckpt, &metrics, device,
        ).unwrap();

        assert!(report.last_train_loss.is_finite());
        assert!((0.0..=1.0).contains(&report.eval_accuracy));
        assert!(dir.path().join("model_epoch_1.mpk.gz").exists());

        let csv = std::fs::read_to_string(metrics.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }

    #[test]
    fn sentiment_epoch_runs_on_tiny_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_string_lossy().to_string();

        let mut cfg = SentimentTrainConfig::default();
        cfg.batch_size = 2;
        cfg.eval_batch_size = 2;
        cfg.logging_steps = 1;

        let samples: Vec<SentimentSample> = (0..4u32)
            .map(|i| SentimentSample { encoded: frame(&[3 + i, 4], SpecialTokens { cls: 1, sep: 2, pad: 0 }, 8), label: (i % 2) as usize })
            .collect();

        let device = Default::default();
        let model: BertClassifier<B> = tiny_config().init(&device);
        let ckpt    = CheckpointManager::new(&out);
        let metrics = MetricsLogger::new(&out).unwrap();

        let (_, report) = train_sentiment(
            &cfg, model,
            SentimentDataset::new(samples.clone()), SentimentDataset::new(samples[..2].to_vec()),
            &ckpt, &metrics, device,
        ).unwrap();

        assert!(report.eval_loss.is_finite());
        assert_eq!(ckpt.latest_epoch().unwrap(), 1);
    }
}
