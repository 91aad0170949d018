use std::collections::BTreeMap;

use pisa_graph::{DependencyGraph, MemoryClass, NodeFilter, NodeId, NodeKind};
use pisa_isa::{Instruction, Opcode};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::hardware::{HardwareModel, MemoryTier, Perf};
use crate::report::{PerformanceReport, TimelineEvent};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScheduleMode {
    #[default]
    InOrder,
    Random,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AnalysisType {
    #[default]
    Standard,
    Instruction,
    Memory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub schedule_mode: ScheduleMode,
    pub analysis_type: AnalysisType,
    /// When set, the ready set is only refreshed once it runs low; clearing
    /// it refreshes every tick.
    pub quick_schedule: bool,
    pub shuffle_seed: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            schedule_mode: ScheduleMode::InOrder,
            analysis_type: AnalysisType::Standard,
            quick_schedule: true,
            shuffle_seed: 0,
        }
    }
}

/// Two-queue cooperative scheduler: walks the dependency graph against a
/// hardware descriptor, dispatching at most one operation and one memory
/// access per simulated tick.
#[derive(Clone, Debug, Default)]
pub struct PerformanceModeler {
    instructions: Vec<Instruction>,
    instance_counts: BTreeMap<Opcode, u64>,
}

impl PerformanceModeler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_instructions(instructions: Vec<Instruction>) -> Self {
        let mut modeler = Self::new();
        modeler.set_instruction_stream(instructions);
        modeler
    }

    pub fn set_instruction_stream(&mut self, instructions: Vec<Instruction>) {
        for instr in &instructions {
            *self.instance_counts.entry(instr.opcode).or_insert(0) += 1;
        }
        self.instructions.extend(instructions);
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn instance_counts(&self) -> &BTreeMap<Opcode, u64> {
        &self.instance_counts
    }

    /// Lower bound ignoring all dependencies: the sum of issue throughputs.
    pub fn quick_cycle_estimate(&self, hardware: &HardwareModel) -> u64 {
        self.instructions
            .iter()
            .map(|instr| hardware.instruction(instr.opcode).throughput)
            .sum()
    }

    /// Runs the co-scheduled instruction/memory simulation and returns the
    /// cycle and NOP accounting plus both dispatch timelines.
    pub fn generate_report(
        &self,
        config: ScheduleConfig,
        hardware: &HardwareModel,
    ) -> PerformanceReport {
        let mut graph = DependencyGraph::from_instructions(&self.instructions);
        classify_data_nodes(&mut graph);
        let mut graph = match config.analysis_type {
            AnalysisType::Standard => graph,
            AnalysisType::Instruction => graph.instruction_graph(),
            AnalysisType::Memory => graph.data_graph(),
        };

        let mut report = PerformanceReport {
            report_name: hardware.name.to_string(),
            instruction_count: self.instructions.len() as u64,
            ..PerformanceReport::default()
        };

        let mut rng = StdRng::seed_from_u64(config.shuffle_seed);
        let mut system_clock: u64 = 0;
        let mut instruction_queue_clock: u64 = 0;
        let mut memory_queue_clock: u64 = 0;
        let mut memory_access_counter: i64 = 0;
        let mut ready = graph.input_nodes(NodeFilter::all());

        while graph.node_count() > 0 {
            // Completed ready nodes retire; their successors may become ready.
            let mut remaining = Vec::with_capacity(ready.len());
            for id in ready {
                let state = graph.node(id).expect("ready node is live").schedule;
                if state.scheduled && state.end_time <= system_clock as i64 {
                    graph
                        .remove_node_maintain_connections(id)
                        .expect("ready node is live");
                } else {
                    remaining.push(id);
                }
            }
            ready = remaining;

            if ready.len() < 2 || !config.quick_schedule {
                ready = graph.input_nodes(NodeFilter::all());
            }
            if config.schedule_mode == ScheduleMode::Random {
                ready.shuffle(&mut rng);
            }

            let mut instr_scheduled = false;
            let mut mem_scheduled = false;
            for &id in &ready {
                let node = graph.node(id).expect("ready node is live");
                if node.schedule.scheduled {
                    continue;
                }
                match node.kind() {
                    NodeKind::Operation => {
                        if instruction_queue_clock <= system_clock {
                            let index = node.instruction().expect("operation has an instruction");
                            let label = node.label().to_string();
                            let perf = hardware.instruction(self.instructions[index].opcode);
                            let end_time = system_clock + perf.latency;

                            let schedule = &mut graph
                                .node_mut(id)
                                .expect("ready node is live")
                                .schedule;
                            schedule.scheduled = true;
                            schedule.start_time = system_clock as i64;
                            schedule.end_time = end_time as i64;

                            instruction_queue_clock += perf.throughput;
                            system_clock += perf.throughput.saturating_sub(1);
                            for _ in 1..perf.throughput {
                                report.operation_timeline.push(TimelineEvent::nop());
                            }
                            report.operation_timeline.push(TimelineEvent {
                                label,
                                instruction: Some(index),
                            });

                            // The issue pre-touches its outputs.
                            for succ in graph.successors(id).to_vec() {
                                graph
                                    .node_mut(succ)
                                    .expect("successor is live")
                                    .schedule
                                    .last_access_time = memory_access_counter;
                            }

                            report.total_cycles_used = report.total_cycles_used.max(end_time);
                            instr_scheduled = true;
                        }
                    }
                    NodeKind::RegisterAddress | NodeKind::Immediate => {
                        if memory_queue_clock <= system_clock {
                            let label = node.label().to_string();
                            let perf =
                                memory_performance(&mut graph, id, memory_access_counter, hardware);
                            memory_access_counter += 1;
                            let end_time = system_clock + perf.latency;

                            let schedule = &mut graph
                                .node_mut(id)
                                .expect("ready node is live")
                                .schedule;
                            schedule.scheduled = true;
                            schedule.start_time = system_clock as i64;
                            schedule.end_time = end_time as i64;

                            memory_queue_clock += perf.throughput;
                            system_clock += perf.throughput.saturating_sub(1);
                            for _ in 1..perf.throughput {
                                report.memory_timeline.push(TimelineEvent::nop());
                            }
                            report.memory_timeline.push(TimelineEvent {
                                label,
                                instruction: None,
                            });

                            report.total_cycles_used = report.total_cycles_used.max(end_time);
                            mem_scheduled = true;
                        }
                    }
                }
                if instr_scheduled && mem_scheduled {
                    break;
                }
            }

            if !instr_scheduled {
                report.operation_timeline.push(TimelineEvent::nop());
                report.total_nops_issued += 1;
            }
            if !mem_scheduled {
                report.memory_timeline.push(TimelineEvent::nop());
            }
            system_clock += 1;
        }

        report
    }

    /// Fills in the graph-topology statistics: boundary counts from the
    /// combined graph, depth and widths from the instruction-graph peel.
    pub fn add_graph_analysis(&self, report: &mut PerformanceReport) {
        let combined = DependencyGraph::from_instructions(&self.instructions);
        report.total_inputs = combined.input_nodes(NodeFilter::all()).len() as u64;
        report.total_outputs = combined.output_nodes().len() as u64;

        let mut peel = combined.instruction_graph();
        let mut depth = 0u64;
        let mut min_width = u64::MAX;
        let mut max_width = 0u64;
        let mut total_width = 0u64;
        while peel.node_count() > 0 {
            depth += 1;
            let layer = peel.input_nodes(NodeFilter::all());
            let width = layer.len() as u64;
            min_width = min_width.min(width);
            max_width = max_width.max(width);
            total_width += width;
            for id in layer {
                peel.remove_node_maintain_connections(id)
                    .expect("layer node is live");
            }
        }
        report.graph_depth = depth;
        report.graph_max_width = max_width;
        if depth > 0 {
            report.graph_min_width = min_width;
            report.graph_average_width = total_width / depth;
        } else {
            report.graph_min_width = 0;
            report.graph_average_width = 0;
        }
    }
}

/// Boundary data nodes span DRAM; interior ones are transient.
fn classify_data_nodes(graph: &mut DependencyGraph) {
    let data_nodes: Vec<NodeId> = graph
        .node_ids()
        .filter(|&id| {
            graph.node(id).expect("listed node is live").kind() != NodeKind::Operation
        })
        .collect();
    for id in data_nodes {
        let class = if graph.in_degree(id) == 0 || graph.out_degree(id) == 0 {
            MemoryClass::MemoryCache
        } else {
            MemoryClass::Register
        };
        graph.node_mut(id).expect("listed node is live").memory_class = Some(class);
    }
}

/// Recency-based tier selection: DRAM-classified nodes always pay the DRAM
/// cost; others tier by distance since their last access.
fn memory_performance(
    graph: &mut DependencyGraph,
    id: NodeId,
    now: i64,
    hardware: &HardwareModel,
) -> Perf {
    let node = graph.node_mut(id).expect("node is live");
    let tier = if node.memory_class == Some(MemoryClass::MemoryCache) {
        MemoryTier::MemoryCache
    } else {
        let distance = now - node.schedule.last_access_time;
        if distance < hardware.size(MemoryTier::Register) as i64 {
            MemoryTier::Register
        } else if distance < hardware.size(MemoryTier::Cache) as i64 {
            MemoryTier::Cache
        } else {
            MemoryTier::MemoryCache
        }
    };
    node.schedule.last_access_time = now;
    hardware.memory(tier)
}
