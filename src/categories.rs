//! The atrace category expansion table.
//!
//! Each atrace category stands for a curated set of kernel tracepoints:
//! whole tracefs groups plus individual events, many of them vendor-specific
//! groups (mdss, sde, msm_bus, ...) that only exist on some kernels. The
//! table is data rather than branching code so tests can iterate it and a
//! vendor table can be merged alongside it.
//!
//! Ideally this stays in sync with atrace's own category definitions. It is
//! not a disaster if they drift, extra events can always be named directly
//! in a config, but expanding here keeps configs small.

use std::collections::BTreeMap;

use crate::events::GroupAndName;

/// Extra per-category events registered by a vendor (e.g. `"gfx"` ->
/// `my_hw/my_custom_event`), merged in after the built-in table.
pub type VendorEvents = BTreeMap<String, Vec<GroupAndName>>;

/// Expansion of one atrace category into kernel tracepoints.
pub struct AtraceCategory {
    pub name: &'static str,
    /// Groups whose every table-known event is added.
    pub groups: &'static [&'static str],
    /// Individual `(group, name)` events, added verbatim whether or not the
    /// table knows them.
    pub events: &'static [(&'static str, &'static str)],
}

/// Look up a category by name. Unknown categories resolve to nothing; they
/// are atrace's to reject.
pub fn category(name: &str) -> Option<&'static AtraceCategory> {
    ATRACE_CATEGORIES.iter().find(|category| category.name == name)
}

pub const ATRACE_CATEGORIES: &[AtraceCategory] = &[
    AtraceCategory {
        name: "gfx",
        groups: &["mdss", "mali", "sde", "dpu", "g2d"],
        events: &[
            ("mdss", "rotator_bw_ao_as_context"),
            ("mdss", "mdp_trace_counter"),
            ("mdss", "tracing_mark_write"),
            ("mdss", "mdp_cmd_wait_pingpong"),
            ("mdss", "mdp_cmd_kickoff"),
            ("mdss", "mdp_cmd_release_bw"),
            ("mdss", "mdp_cmd_readptr_done"),
            ("mdss", "mdp_cmd_pingpong_done"),
            ("mdss", "mdp_misr_crc"),
            ("mdss", "mdp_compare_bw"),
            ("mdss", "mdp_perf_update_bus"),
            ("mdss", "mdp_video_underrun_done"),
            ("mdss", "mdp_commit"),
            ("mdss", "mdp_mixer_update"),
            ("mdss", "mdp_perf_prefill_calc"),
            ("mdss", "mdp_perf_set_ot"),
            ("mdss", "mdp_perf_set_wm_levels"),
            ("mdss", "mdp_perf_set_panic_luts"),
            ("mdss", "mdp_perf_set_qos_luts"),
            ("mdss", "mdp_sspp_change"),
            ("mdss", "mdp_sspp_set"),
            ("mali", "tracing_mark_write"),
            ("sde", "tracing_mark_write"),
            ("sde", "sde_perf_update_bus"),
            ("sde", "sde_perf_set_qos_luts"),
            ("sde", "sde_perf_set_ot"),
            ("sde", "sde_perf_set_danger_luts"),
            ("sde", "sde_perf_crtc_update"),
            ("sde", "sde_perf_calc_crtc"),
            ("sde", "sde_evtlog"),
            ("sde", "sde_encoder_underrun"),
            ("sde", "sde_cmd_release_bw"),
            ("dpu", "tracing_mark_write"),
            ("g2d", "tracing_mark_write"),
            ("g2d", "g2d_perf_update_qos"),
        ],
    },
    AtraceCategory {
        name: "ion",
        groups: &[],
        events: &[("kmem", "ion_alloc_buffer_start")],
    },
    // sched_wakeup is deliberately absent: it is high volume and mostly
    // redundant once sched_waking is on. It can still be enabled explicitly.
    AtraceCategory {
        name: "sched",
        groups: &["cgroup", "systrace", "scm"],
        events: &[
            ("sched", "sched_switch"),
            ("sched", "sched_waking"),
            ("sched", "sched_blocked_reason"),
            ("sched", "sched_cpu_hotplug"),
            ("sched", "sched_pi_setprio"),
            ("sched", "sched_process_exit"),
            ("cgroup", "cgroup_transfer_tasks"),
            ("cgroup", "cgroup_setup_root"),
            ("cgroup", "cgroup_rmdir"),
            ("cgroup", "cgroup_rename"),
            ("cgroup", "cgroup_remount"),
            ("cgroup", "cgroup_release"),
            ("cgroup", "cgroup_mkdir"),
            ("cgroup", "cgroup_destroy_root"),
            ("cgroup", "cgroup_attach_task"),
            ("oom", "oom_score_adj_update"),
            ("task", "task_rename"),
            ("task", "task_newtask"),
            ("systrace", "0"),
            ("scm", "scm_call_start"),
            ("scm", "scm_call_end"),
        ],
    },
    AtraceCategory {
        name: "irq",
        groups: &["irq", "ipi"],
        events: &[
            ("irq", "tasklet_hi_exit"),
            ("irq", "tasklet_hi_entry"),
            ("irq", "tasklet_exit"),
            ("irq", "tasklet_entry"),
            ("irq", "softirq_raise"),
            ("irq", "softirq_exit"),
            ("irq", "softirq_entry"),
            ("irq", "irq_handler_exit"),
            ("irq", "irq_handler_entry"),
            ("ipi", "ipi_raise"),
            ("ipi", "ipi_exit"),
            ("ipi", "ipi_entry"),
        ],
    },
    AtraceCategory {
        name: "irqoff",
        groups: &[],
        events: &[("preemptirq", "irq_enable"), ("preemptirq", "irq_disable")],
    },
    AtraceCategory {
        name: "preemptoff",
        groups: &[],
        events: &[
            ("preemptirq", "preempt_enable"),
            ("preemptirq", "preempt_disable"),
        ],
    },
    AtraceCategory {
        name: "i2c",
        groups: &["i2c"],
        events: &[
            ("i2c", "i2c_read"),
            ("i2c", "i2c_write"),
            ("i2c", "i2c_result"),
            ("i2c", "i2c_reply"),
            ("i2c", "smbus_read"),
            ("i2c", "smbus_write"),
            ("i2c", "smbus_result"),
            ("i2c", "smbus_reply"),
        ],
    },
    AtraceCategory {
        name: "freq",
        groups: &["msm_bus"],
        events: &[
            ("power", "cpu_frequency"),
            ("power", "gpu_frequency"),
            ("power", "clock_set_rate"),
            ("power", "clock_disable"),
            ("power", "clock_enable"),
            ("clk", "clk_set_rate"),
            ("clk", "clk_disable"),
            ("clk", "clk_enable"),
            ("power", "cpu_frequency_limits"),
            ("power", "suspend_resume"),
            ("cpuhp", "cpuhp_enter"),
            ("cpuhp", "cpuhp_exit"),
            ("cpuhp", "cpuhp_pause"),
            ("msm_bus", "bus_update_request_end"),
            ("msm_bus", "bus_update_request"),
            ("msm_bus", "bus_rules_matches"),
            ("msm_bus", "bus_max_votes"),
            ("msm_bus", "bus_client_status"),
            ("msm_bus", "bus_bke_params"),
            ("msm_bus", "bus_bimc_config_limiter"),
            ("msm_bus", "bus_avail_bw"),
            ("msm_bus", "bus_agg_bw"),
        ],
    },
    AtraceCategory {
        name: "membus",
        groups: &["memory_bus"],
        events: &[],
    },
    AtraceCategory {
        name: "idle",
        groups: &[],
        events: &[("power", "cpu_idle")],
    },
    AtraceCategory {
        name: "disk",
        groups: &[],
        events: &[
            ("f2fs", "f2fs_sync_file_enter"),
            ("f2fs", "f2fs_sync_file_exit"),
            ("f2fs", "f2fs_write_begin"),
            ("f2fs", "f2fs_write_end"),
            ("ext4", "ext4_da_write_begin"),
            ("ext4", "ext4_da_write_end"),
            ("ext4", "ext4_sync_file_enter"),
            ("ext4", "ext4_sync_file_exit"),
            ("block", "block_rq_issue"),
            ("block", "block_rq_complete"),
        ],
    },
    AtraceCategory {
        name: "mmc",
        groups: &["mmc"],
        events: &[],
    },
    AtraceCategory {
        name: "load",
        groups: &["cpufreq_interactive"],
        events: &[],
    },
    AtraceCategory {
        name: "sync",
        // sync: linux kernel < 4.9, fence: == 4.9.x, dma_fence: > 4.9
        groups: &["sync", "fence", "dma_fence"],
        events: &[
            ("sync", "sync_pt"),
            ("sync", "sync_timeline"),
            ("sync", "sync_wait"),
            ("fence", "fence_annotate_wait_on"),
            ("fence", "fence_destroy"),
            ("fence", "fence_emit"),
            ("fence", "fence_enable_signal"),
            ("fence", "fence_init"),
            ("fence", "fence_signaled"),
            ("fence", "fence_wait_end"),
            ("fence", "fence_wait_start"),
        ],
    },
    AtraceCategory {
        name: "workq",
        groups: &["workqueue"],
        events: &[
            ("workqueue", "workqueue_queue_work"),
            ("workqueue", "workqueue_execute_start"),
            ("workqueue", "workqueue_execute_end"),
            ("workqueue", "workqueue_activate_work"),
        ],
    },
    AtraceCategory {
        name: "memreclaim",
        groups: &["lowmemorykiller"],
        events: &[
            ("vmscan", "mm_vmscan_direct_reclaim_begin"),
            ("vmscan", "mm_vmscan_direct_reclaim_end"),
            ("vmscan", "mm_vmscan_kswapd_wake"),
            ("vmscan", "mm_vmscan_kswapd_sleep"),
            ("lowmemorykiller", "lowmemory_kill"),
        ],
    },
    AtraceCategory {
        name: "regulators",
        groups: &["regulator"],
        events: &[
            ("regulator", "regulator_set_voltage_complete"),
            ("regulator", "regulator_set_voltage"),
            ("regulator", "regulator_enable_delay"),
            ("regulator", "regulator_enable_complete"),
            ("regulator", "regulator_enable"),
            ("regulator", "regulator_disable_complete"),
            ("regulator", "regulator_disable"),
        ],
    },
    AtraceCategory {
        name: "binder_driver",
        groups: &[],
        events: &[
            ("binder", "binder_transaction"),
            ("binder", "binder_transaction_received"),
            ("binder", "binder_transaction_alloc_buf"),
            ("binder", "binder_set_priority"),
        ],
    },
    AtraceCategory {
        name: "binder_lock",
        groups: &[],
        events: &[
            ("binder", "binder_lock"),
            ("binder", "binder_locked"),
            ("binder", "binder_unlock"),
        ],
    },
    AtraceCategory {
        name: "pagecache",
        groups: &["filemap"],
        events: &[
            ("filemap", "mm_filemap_delete_from_page_cache"),
            ("filemap", "mm_filemap_add_to_page_cache"),
            ("filemap", "filemap_set_wb_err"),
            ("filemap", "file_check_and_advance_wb_err"),
        ],
    },
    AtraceCategory {
        name: "memory",
        groups: &[],
        events: &[
            ("kmem", "rss_stat"),
            ("kmem", "ion_heap_grow"),
            ("kmem", "ion_heap_shrink"),
            // ion_stat supersedes ion_heap_grow/shrink for kernel 4.19+
            ("ion", "ion_stat"),
            ("mm_event", "mm_event_record"),
            ("dmabuf_heap", "dma_heap_stat"),
        ],
    },
    AtraceCategory {
        name: "thermal",
        groups: &[],
        events: &[
            ("thermal", "thermal_temperature"),
            ("thermal", "cdev_update"),
        ],
    },
];
