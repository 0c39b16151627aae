/// Stats from one orchestration pass.
#[derive(Debug, Default)]
pub struct PassStats {
    pub topics_processed: u32,
    pub topics_failed: u32,
    pub topics_completed: u32,
    pub sources_fetched: u32,
    pub sources_skipped: u32,
    pub results_saved: u32,
    pub summaries_generated: u32,
    /// The guard was held by another pass; this run did nothing.
    pub guard_busy: bool,
}

impl PassStats {
    pub fn guard_busy() -> Self {
        Self {
            guard_busy: true,
            ..Default::default()
        }
    }
}

impl std::fmt::Display for PassStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.guard_busy {
            return write!(f, "Pass skipped: another pass was already running");
        }
        writeln!(f, "\n=== Pass Complete ===")?;
        writeln!(f, "Topics processed:    {}", self.topics_processed)?;
        writeln!(f, "Topics failed:       {}", self.topics_failed)?;
        writeln!(f, "Topics completed:    {}", self.topics_completed)?;
        writeln!(f, "Sources fetched:     {}", self.sources_fetched)?;
        writeln!(f, "Sources skipped:     {} (already sufficient)", self.sources_skipped)?;
        writeln!(f, "Results saved:       {}", self.results_saved)?;
        write!(f, "Summaries generated: {}", self.summaries_generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_stats_render_the_skip_message() {
        let stats = PassStats::guard_busy();
        assert!(stats.to_string().contains("skipped"));
    }
}
