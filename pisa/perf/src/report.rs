use std::io::{self, Write};

use serde::Serialize;

/// One slot on a dispatch timeline: an issued node or a NOP.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimelineEvent {
    pub label: String,
    /// Index into the modeled instruction stream; `None` for NOPs and data
    /// nodes.
    pub instruction: Option<usize>,
}

impl TimelineEvent {
    pub fn nop() -> Self {
        Self {
            label: "NOP".to_string(),
            instruction: None,
        }
    }

    pub fn is_nop(&self) -> bool {
        self.label == "NOP"
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PerformanceReport {
    pub report_name: String,
    pub instruction_count: u64,
    pub total_cycles_used: u64,
    pub total_nops_issued: u64,
    pub total_inputs: u64,
    pub total_outputs: u64,
    pub graph_depth: u64,
    pub graph_min_width: u64,
    pub graph_max_width: u64,
    pub graph_average_width: u64,
    pub operation_timeline: Vec<TimelineEvent>,
    pub memory_timeline: Vec<TimelineEvent>,
}

impl PerformanceReport {
    pub fn instructions_per_cycle(&self) -> f64 {
        if self.total_cycles_used == 0 {
            0.0
        } else {
            self.instruction_count as f64 / self.total_cycles_used as f64
        }
    }

    pub fn print(&self, out: &mut impl Write) -> io::Result<()> {
        let name = &self.report_name;
        writeln!(out, "{name}_total_cycles: {}", self.total_cycles_used)?;
        writeln!(out, "{name}_total_nops: {}", self.total_nops_issued)?;
        writeln!(
            out,
            "{name}_instructions_per_cycle: {:.6}",
            self.instructions_per_cycle()
        )?;
        writeln!(out, "{name}_total_inputs: {}", self.total_inputs)?;
        writeln!(out, "{name}_total_outputs: {}", self.total_outputs)?;
        writeln!(out, "{name}_total_depth: {}", self.graph_depth)?;
        writeln!(out, "{name}_total_avg_width: {}", self.graph_average_width)?;
        writeln!(out, "{name}_total_min_width: {}", self.graph_min_width)?;
        writeln!(out, "{name}_total_max_width: {}", self.graph_max_width)?;
        Ok(())
    }

    pub fn print_timeline(&self, out: &mut impl Write) -> io::Result<()> {
        for (cycle, event) in self.operation_timeline.iter().enumerate() {
            writeln!(out, "{cycle}:{}", event.label)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipc_guards_zero_cycles() {
        let report = PerformanceReport::default();
        assert_eq!(report.instructions_per_cycle(), 0.0);
    }

    #[test]
    fn print_emits_prefixed_lines() {
        let report = PerformanceReport {
            report_name: "combined".to_string(),
            total_cycles_used: 10,
            instruction_count: 5,
            ..PerformanceReport::default()
        };
        let mut out = Vec::new();
        report.print(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("combined_total_cycles: 10"));
        assert!(text.contains("combined_instructions_per_cycle: 0.500000"));
    }
}
