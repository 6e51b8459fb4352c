use std::{
    fmt,
    sync::atomic::{AtomicI64, Ordering},
};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Statistic {
    VaoBinds,
    VboBinds,
    DrawCalls,
    VerticesDrawn,
    VertexUpload,
    VertexDownload,
}

impl Statistic {
    pub const COUNT: usize = 6;

    pub const ALL: [Statistic; Self::COUNT] = [
        Statistic::VaoBinds,
        Statistic::VboBinds,
        Statistic::DrawCalls,
        Statistic::VerticesDrawn,
        Statistic::VertexUpload,
        Statistic::VertexDownload,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Statistic::VaoBinds => "vao binds",
            Statistic::VboBinds => "vbo binds",
            Statistic::DrawCalls => "draw calls",
            Statistic::VerticesDrawn => "vertices drawn",
            Statistic::VertexUpload => "vertex upload",
            Statistic::VertexDownload => "vertex download",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Monotonic diagnostic counters. Never consulted for control flow.
#[derive(Default, Debug)]
pub struct Statistics {
    counters: [AtomicI64; Statistic::COUNT],
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, stat: Statistic) {
        self.add(stat, 1);
    }

    pub fn add(&self, stat: Statistic, amount: i64) {
        self.counters[stat as usize].fetch_add(amount, Ordering::Relaxed);
    }

    pub fn get(&self, stat: Statistic) -> i64 {
        self.counters[stat as usize].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatSnapshot {
        StatSnapshot(Statistic::ALL.map(|s| self.get(s)))
    }

    #[cfg(feature = "tracing")]
    pub fn plot(&self) {
        use tracy_client::plot;

        if tracy_client::Client::running().is_none() {
            return;
        }
        plot!("vao binds", self.get(Statistic::VaoBinds) as f64);
        plot!("vbo binds", self.get(Statistic::VboBinds) as f64);
        plot!("draw calls", self.get(Statistic::DrawCalls) as f64);
        plot!("vertices drawn", self.get(Statistic::VerticesDrawn) as f64);
        plot!("vertex upload", self.get(Statistic::VertexUpload) as f64);
        plot!("vertex download", self.get(Statistic::VertexDownload) as f64);
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct StatSnapshot([i64; Statistic::COUNT]);

impl StatSnapshot {
    pub fn get(&self, stat: Statistic) -> i64 {
        self.0[stat as usize]
    }
}

impl fmt::Display for StatSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stat) in Statistic::ALL.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", stat, self.0[i])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let stats = Statistics::new();
        stats.increment(Statistic::DrawCalls);
        stats.add(Statistic::VerticesDrawn, 6);
        stats.add(Statistic::VerticesDrawn, 3);

        let snap = stats.snapshot();
        assert_eq!(snap.get(Statistic::DrawCalls), 1);
        assert_eq!(snap.get(Statistic::VerticesDrawn), 9);
        assert_eq!(snap.get(Statistic::VaoBinds), 0);
    }

    #[test]
    fn snapshot_display_names_every_counter() {
        let stats = Statistics::new();
        stats.increment(Statistic::VboBinds);
        let text = stats.snapshot().to_string();
        assert!(text.contains("vbo binds=1"));
        assert!(text.contains("vertex download=0"));
    }
}
