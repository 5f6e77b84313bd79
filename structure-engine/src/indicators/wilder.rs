/// Wilder's running average
///
/// The first value is the plain mean of the first `period` inputs; after
/// that each input moves the average by `(x - avg) / period`.
#[derive(Debug, Clone)]
pub struct WilderAverage {
    period: usize,
    seeded: usize,
    sum: f64,
    value: Option<f64>,
}

impl WilderAverage {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            seeded: 0,
            sum: 0.0,
            value: None,
        }
    }

    pub fn update(&mut self, x: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        let p = self.period as f64;
        match self.value {
            Some(avg) => self.value = Some(avg + (x - avg) / p),
            None => {
                self.sum += x;
                self.seeded += 1;
                if self.seeded == self.period {
                    self.value = Some(self.sum / p);
                }
            }
        }
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}
