use common::{Candle, EngineError, Result, TimeframeRole, TimeframeSet};
use tracing::warn;

use super::ring::RingBuffer;

/// Outcome of merging a candle into a series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A new epoch was added at the end
    Appended,
    /// The in-progress bar with the same epoch was updated in place
    Replaced,
}

/// Ordered candles for one timeframe
///
/// Epochs are strictly increasing. Gaps are kept as gaps. With a capacity the
/// oldest bars are evicted once full, which is what a live feed wants; the
/// backtest uses an unbounded series.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    role: TimeframeRole,
    granularity: i64,
    bars: RingBuffer<Candle>,
}

impl CandleSeries {
    pub fn new(role: TimeframeRole, granularity: i64) -> Self {
        Self {
            role,
            granularity,
            bars: RingBuffer::unbounded(),
        }
    }

    pub fn with_capacity(role: TimeframeRole, granularity: i64, capacity: usize) -> Self {
        Self {
            role,
            granularity,
            bars: RingBuffer::new(capacity),
        }
    }

    /// Build a series from already ordered candles
    pub fn from_candles(role: TimeframeRole, granularity: i64, candles: &[Candle]) -> Result<Self> {
        let mut series = Self::new(role, granularity);
        for candle in candles {
            series.append_or_replace(*candle)?;
        }
        Ok(series)
    }

    pub fn role(&self) -> TimeframeRole {
        self.role
    }

    pub fn granularity(&self) -> i64 {
        self.granularity
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.bars.get(index)
    }

    pub fn last(&self) -> Option<&Candle> {
        self.bars.last()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Candle> + '_ {
        self.bars.iter()
    }

    pub fn to_vec(&self) -> Vec<Candle> {
        self.bars.to_vec()
    }

    /// Merge an update: same epoch as the last bar replaces it, a newer epoch appends
    pub fn append_or_replace(&mut self, candle: Candle) -> Result<MergeOutcome> {
        if let Some(last) = self.bars.last_mut() {
            if candle.epoch == last.epoch {
                *last = candle;
                return Ok(MergeOutcome::Replaced);
            }
            if candle.epoch < last.epoch {
                return Err(EngineError::OutOfOrderCandle {
                    role: self.role,
                    last: last.epoch,
                    got: candle.epoch,
                });
            }
        }
        self.bars.push(candle);
        Ok(MergeOutcome::Appended)
    }

    /// Bars with `epoch >= since`, oldest first
    pub fn view_since(&self, since: i64) -> Vec<Candle> {
        let start = self.partition_point(|c| c.epoch < since);
        (start..self.len()).filter_map(|i| self.get(i).copied()).collect()
    }

    /// Index of the last bar whose epoch is at or before `epoch`
    pub fn index_at_or_before(&self, epoch: i64) -> Option<usize> {
        self.partition_point(|c| c.epoch <= epoch).checked_sub(1)
    }

    /// Index of the last bar fully closed by time `now`
    pub fn last_closed_index(&self, now: i64) -> Option<usize> {
        self.index_at_or_before(now - self.granularity)
    }

    /// Closed bars as of `now`, oldest first
    pub fn closed_candles(&self, now: i64) -> Vec<Candle> {
        match self.last_closed_index(now) {
            Some(idx) => (0..=idx).filter_map(|i| self.get(i).copied()).collect(),
            None => Vec::new(),
        }
    }

    fn partition_point(&self, pred: impl Fn(&Candle) -> bool) -> usize {
        let (mut lo, mut hi) = (0, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.get(mid) {
                Some(c) if pred(c) => lo = mid + 1,
                _ => hi = mid,
            }
        }
        lo
    }
}

/// Candle series for the three timeframe roles
///
/// This is the feed interface the core consumes: updates are merged with
/// `append_or_replace` and read back with `view_since`.
#[derive(Debug, Clone)]
pub struct MarketData {
    pub htf: CandleSeries,
    pub ltf: CandleSeries,
    pub etf: CandleSeries,
}

impl MarketData {
    pub fn new(timeframes: &TimeframeSet) -> Self {
        Self {
            htf: CandleSeries::new(TimeframeRole::Htf, timeframes.htf_secs),
            ltf: CandleSeries::new(TimeframeRole::Ltf, timeframes.ltf_secs),
            etf: CandleSeries::new(TimeframeRole::Etf, timeframes.etf_secs),
        }
    }

    pub fn with_capacity(timeframes: &TimeframeSet, capacity: usize) -> Self {
        Self {
            htf: CandleSeries::with_capacity(TimeframeRole::Htf, timeframes.htf_secs, capacity),
            ltf: CandleSeries::with_capacity(TimeframeRole::Ltf, timeframes.ltf_secs, capacity),
            etf: CandleSeries::with_capacity(TimeframeRole::Etf, timeframes.etf_secs, capacity),
        }
    }

    /// Build all three series from execution-timeframe candles by resampling
    pub fn from_execution_candles(timeframes: &TimeframeSet, candles: &[Candle]) -> Result<Self> {
        for coarse in [timeframes.ltf_secs, timeframes.htf_secs] {
            if timeframes.etf_secs <= 0 || coarse % timeframes.etf_secs != 0 {
                warn!(
                    etf_secs = timeframes.etf_secs,
                    coarse_secs = coarse,
                    "timeframe is not a multiple of the execution granularity"
                );
            }
        }
        let ltf = super::resample(candles, timeframes.etf_secs, timeframes.ltf_secs);
        let htf = super::resample(candles, timeframes.etf_secs, timeframes.htf_secs);
        Ok(Self {
            htf: CandleSeries::from_candles(TimeframeRole::Htf, timeframes.htf_secs, &htf)?,
            ltf: CandleSeries::from_candles(TimeframeRole::Ltf, timeframes.ltf_secs, &ltf)?,
            etf: CandleSeries::from_candles(TimeframeRole::Etf, timeframes.etf_secs, candles)?,
        })
    }

    pub fn series(&self, role: TimeframeRole) -> &CandleSeries {
        match role {
            TimeframeRole::Htf => &self.htf,
            TimeframeRole::Ltf => &self.ltf,
            TimeframeRole::Etf => &self.etf,
        }
    }

    pub fn series_mut(&mut self, role: TimeframeRole) -> &mut CandleSeries {
        match role {
            TimeframeRole::Htf => &mut self.htf,
            TimeframeRole::Ltf => &mut self.ltf,
            TimeframeRole::Etf => &mut self.etf,
        }
    }

    pub fn append_or_replace(
        &mut self,
        role: TimeframeRole,
        candle: Candle,
    ) -> Result<MergeOutcome> {
        self.series_mut(role).append_or_replace(candle)
    }

    pub fn view_since(&self, role: TimeframeRole, since: i64) -> Vec<Candle> {
        self.series(role).view_since(since)
    }
}
