mod common;
use common::{ramp_recording, synthetic_recording};
use eegprep::{segment, stack, ActionKind, ChannelFilter, ErrorKind, PipelineConfig};

#[test]
fn default_filter_drops_auxiliary_channels() {
    let rec = synthetic_recording("MM05", 13_500, 1000.0, 2);
    let cfg = PipelineConfig::default();
    let segs = segment(&rec, cfg.action, &cfg.channel_filter(), cfg.window_duration_ms).unwrap();

    assert_eq!(segs.len(), 3);
    for (w, seg) in segs.iter().enumerate() {
        assert_eq!(seg.ch_names, ["FP1", "C3", "CZ", "C4"]);
        assert_eq!(seg.data.dim(), (4, 4500));
        assert_eq!(seg.window, w);
        assert_eq!(seg.label, 2);
        assert_eq!(seg.action, ActionKind::Thinking);
    }
}

#[test]
fn segment_count_is_floor_of_length() {
    let rec = ramp_recording(&["A", "B"], 10_007, 500.0);
    // 250 ms at 500 Hz = 125 samples.
    let segs = segment(&rec, ActionKind::Thinking, &ChannelFilter::all(), 250.0).unwrap();
    assert_eq!(segs.len(), 10_007 / 125);
    let last = segs.last().unwrap();
    assert_eq!(last.start + 125, 80 * 125);
    assert!(segs.iter().all(|s| s.data.ncols() == 125));
}

#[test]
fn segments_concatenate_back_to_the_prefix() {
    let rec = ramp_recording(&["A", "B", "C"], 1050, 1000.0);
    let segs = segment(&rec, ActionKind::Clearing, &ChannelFilter::ignore(["B"]), 100.0).unwrap();
    let (x, y) = stack(&segs).unwrap();
    assert_eq!(x.dim(), (10, 2, 100));
    assert_eq!(y.len(), 10);
    for e in 0..10 {
        for t in 0..100 {
            assert_eq!(x[[e, 0, t]], rec.data[[0, e * 100 + t]]);
            assert_eq!(x[[e, 1, t]], rec.data[[2, e * 100 + t]]);
        }
    }
}

#[test]
fn keep_wins_over_ignore() {
    let rec = ramp_recording(&["A", "B", "C"], 400, 1000.0);
    let filter = ChannelFilter::keep(["A", "B"]).with_ignore(["A"]);
    let segs = segment(&rec, ActionKind::Thinking, &filter, 100.0).unwrap();
    assert_eq!(segs[0].ch_names, ["A", "B"]);
}

#[test]
fn failures_distinguish_configuration_from_data() {
    let rec = ramp_recording(&["A", "B"], 400, 1000.0);

    let all_ignored = ChannelFilter::ignore(["A", "B"]);
    let err = segment(&rec, ActionKind::Thinking, &all_ignored, 100.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let unknown_keep = ChannelFilter::keep(["Z"]);
    let err = segment(&rec, ActionKind::Thinking, &unknown_keep, 100.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let err = segment(&rec, ActionKind::Thinking, &ChannelFilter::all(), 500.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = segment(&rec, ActionKind::Thinking, &ChannelFilter::all(), 0.25).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
