// ============================================================
// Layer 5 — Plateau Learning-Rate Schedule
// ============================================================
// Reduce-on-plateau in "max" mode, driven by validation
// accuracy:
//
//   val_acc > best           → best = val_acc, bad_epochs = 0
//   otherwise                → bad_epochs += 1
//   bad_epochs > lr_patience → lr = max(lr * factor, min_lr)
//                              bad_epochs = 0
//
// This counter is deliberately separate from the early-stopping
// counter: with lr_patience = 5 and patience = 15 the rate is
// halved twice before training gives up.
//
// Reference: PyTorch ReduceLROnPlateau(mode="max")

#[derive(Debug, Clone, PartialEq)]
pub struct PlateauScheduler {
    lr:          f64,
    factor:      f64,
    patience:    usize,
    min_lr:      f64,
    best:        f64,
    bad_epochs:  usize,
}

impl PlateauScheduler {
    pub fn new(lr: f64, factor: f64, patience: usize, min_lr: f64) -> Self {
        Self {
            lr,
            factor,
            patience,
            min_lr,
            best: f64::NEG_INFINITY,
            bad_epochs: 0,
        }
    }

    /// Current learning rate.
    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Feed one epoch's validation accuracy. Returns true if the rate dropped.
    pub fn step(&mut self, val_acc: f64) -> bool {
        if val_acc > self.best {
            self.best = val_acc;
            self.bad_epochs = 0;
            return false;
        }

        self.bad_epochs += 1;
        if self.bad_epochs <= self.patience {
            return false;
        }

        self.bad_epochs = 0;
        let reduced = (self.lr * self.factor).max(self.min_lr);
        let changed = reduced < self.lr;
        if changed {
            tracing::info!("Reducing learning rate {:.2e} → {:.2e}", self.lr, reduced);
        }
        self.lr = reduced;
        changed
    }
}
