//! Batch runs over a small archive written to a temporary directory.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use obs_process::{ObsProcessConfig, ObsProcessor};
use radar_common::{Cell, Field, PathTemplate, Quantity};
use radar_tools::{CompositeFile, JsonCompositeReader, ZrRelation};
use test_utils::{assert_cell_approx_eq, create_constant_field, extent, grid, temp_test_dir, time};

const OUTPUT_RECIPE: &str = "%Y%m%d%H%M_processed.json";

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self { dir: temp_test_dir() }
    }

    fn input_dir(&self) -> PathBuf {
        self.dir.path().join("input")
    }

    fn output_dir(&self) -> PathBuf {
        self.dir.path().join("output")
    }

    fn write_rate(&self, at: DateTime<Utc>, rate: f32) {
        let template = PathTemplate::new(self.input_dir(), time::RECIPE).unwrap();
        let data = create_constant_field(grid::COMPOSITE.width, grid::COMPOSITE.height, rate);
        CompositeFile::new(
            Quantity::PrecipRate,
            Some(at),
            &data,
            None,
            Some(&grid::COMPOSITE.build()),
        )
        .write(&template.path_for(at).unwrap())
        .unwrap();
    }

    fn input_path(&self, at: DateTime<Utc>) -> PathBuf {
        PathTemplate::new(self.input_dir(), time::RECIPE)
            .unwrap()
            .path_for(at)
            .unwrap()
    }

    fn output_path(&self, recipe: &str, at: DateTime<Utc>) -> PathBuf {
        PathTemplate::new(self.output_dir(), recipe)
            .unwrap()
            .path_for(at)
            .unwrap()
    }

    /// Write `extra` YAML below the common settings and load it back.
    fn config(&self, extra: &str) -> ObsProcessConfig {
        let yaml = format!(
            "input_dir: {}\noutput_dir: {}\nstart: 2024-07-01T16:00:00Z\nend: 2024-07-01T16:20:00Z\n{}",
            self.input_dir().display(),
            self.output_dir().display(),
            extra
        );
        let path = self.dir.path().join("config.yaml");
        std::fs::write(&path, yaml).unwrap();
        ObsProcessConfig::from_yaml(&path).unwrap()
    }
}

fn read(path: &Path) -> CompositeFile {
    JsonCompositeReader::read_file(path)
        .unwrap()
        .unwrap_or_else(|| panic!("{} not written", path.display()))
}

fn decoded(path: &Path) -> (Field, Field) {
    let raw = read(path).decode(path).unwrap();
    let quality = raw.quality_or_default();
    (raw.data, quality)
}

#[test]
fn test_instantaneous_batch_writes_every_time() {
    let ws = Workspace::new();
    for (minute, rate) in [(0, 2.0), (10, 4.0), (20, 6.0)] {
        ws.write_rate(time::at(16, minute), rate);
    }

    let summary = ObsProcessor::new(ws.config("")).unwrap().run().unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.written, 3);
    assert_eq!(summary.failed, 0);

    let path = ws.output_path(OUTPUT_RECIPE, time::at(16, 10));
    let doc = read(&path);
    assert_eq!(doc.quantity, Quantity::PrecipRate);
    assert_eq!(doc.valid_time, Some(time::at(16, 10)));
    let (data, _) = decoded(&path);
    assert_eq!(data.shape(), (grid::COMPOSITE.height, grid::COMPOSITE.width));
    assert_cell_approx_eq!(data.cells()[0], 4.0, 1e-3);
}

#[test]
fn test_missing_composite_writes_placeholder_on_destination() {
    let ws = Workspace::new();
    ws.write_rate(time::at(16, 0), 2.0);
    ws.write_rate(time::at(16, 20), 6.0);

    let extra = format!(
        "destination:\n  extent: [{:?}, {:?}, {:?}, {:?}]\n  nx: 30\n  ny: 20\n",
        extent::QUEBEC[0],
        extent::QUEBEC[1],
        extent::QUEBEC[2],
        extent::QUEBEC[3]
    );
    let summary = ObsProcessor::new(ws.config(&extra)).unwrap().run().unwrap();
    assert_eq!(summary.written, 2);
    assert_eq!(summary.no_data, 1);

    let (data, quality) = decoded(&ws.output_path(OUTPUT_RECIPE, time::at(16, 10)));
    assert_eq!(data.shape(), (20, 30));
    assert!(data.cells().iter().all(|&c| c == Cell::Missing));
    assert!(quality.cells().iter().all(|&c| c == Cell::Value(0.0)));
}

#[test]
fn test_parallel_tasks_share_one_index() {
    let ws = Workspace::new();
    for minute in [0, 10, 20] {
        ws.write_rate(time::at(16, minute), 2.0);
    }
    let extra = "resample:\n  method: tile_average\ndestination:\n  extent: [-75.1, -73.0, 45.0, 46.5]\n  nx: 20\n  ny: 15\n";
    let processor = ObsProcessor::new(ws.config(extra)).unwrap();
    let summary = processor.run().unwrap();
    assert_eq!(summary.written, 3);

    let stats = processor.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 2);
}

#[test]
fn test_missing_composite_without_destination_writes_nothing() {
    let ws = Workspace::new();
    ws.write_rate(time::at(16, 0), 2.0);

    let summary = ObsProcessor::new(ws.config("")).unwrap().run().unwrap();
    assert_eq!(summary.written, 1);
    assert_eq!(summary.no_data, 2);
    assert!(!ws.output_path(OUTPUT_RECIPE, time::at(16, 10)).exists());
}

#[test]
fn test_complete_dataset_skips_existing_outputs() {
    let ws = Workspace::new();
    for minute in [0, 10, 20] {
        ws.write_rate(time::at(16, minute), 1.0);
    }
    ObsProcessor::new(ws.config("")).unwrap().run().unwrap();

    let summary = ObsProcessor::new(ws.config("complete_dataset: true\n"))
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.written, 0);
}

#[test]
fn test_malformed_input_is_counted_as_failure() {
    let ws = Workspace::new();
    ws.write_rate(time::at(16, 0), 1.0);
    ws.write_rate(time::at(16, 20), 1.0);
    let bad = ws.input_path(time::at(16, 10));
    std::fs::write(&bad, "{not json").unwrap();

    let summary = ObsProcessor::new(ws.config("")).unwrap().run().unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.written, 2);
}

#[test]
fn test_accumulation_batch() {
    let ws = Workspace::new();
    for minute in [40, 50] {
        ws.write_rate(time::at(15, minute), 6.0);
    }
    for minute in [0, 10, 20] {
        ws.write_rate(time::at(16, minute), 6.0);
    }

    let summary = ObsProcessor::new(ws.config("accumulation_minutes: 30\n"))
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(summary.written, 3);

    let path = ws.output_path(OUTPUT_RECIPE, time::at(16, 0));
    assert_eq!(read(&path).quantity, Quantity::Accumulation);
    let (data, _) = decoded(&path);
    assert_cell_approx_eq!(data.cells()[0], 3.0, 1e-3);
}

#[test]
fn test_accumulation_with_missing_intermediate_fails() {
    let ws = Workspace::new();
    for minute in [0, 10, 20] {
        ws.write_rate(time::at(16, minute), 6.0);
    }

    // 16:00 and 16:10 reach back before the archive starts
    let summary = ObsProcessor::new(ws.config("accumulation_minutes: 30\n"))
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(summary.written, 1);
    assert_eq!(summary.failed, 2);
}

#[test]
fn test_time_interpolation_of_processed_files() {
    let ws = Workspace::new();
    for (minute, rate) in [(0, 2.0), (10, 4.0), (20, 6.0)] {
        ws.write_rate(time::at(16, minute), rate);
    }

    let extra = "nowcast:\n  output_step_minutes: 5\n  end: 2024-07-01T16:30:00Z\n";
    let summary = ObsProcessor::new(ws.config(extra)).unwrap().run().unwrap();
    // Three processed files, seven interpolated ones
    assert_eq!(summary.written, 10);
    assert_eq!(summary.failed, 0);

    let recipe = "%Y%m%d%H%M_interpolated.json";
    for (minute, expected) in [(0, 2.0), (5, 3.0), (10, 4.0), (15, 5.0), (20, 6.0)] {
        let (data, _) = decoded(&ws.output_path(recipe, time::at(16, minute)));
        assert_cell_approx_eq!(data.cells()[0], expected, 1e-3);
    }

    // Zero motion persists the last processed file
    let (data, _) = decoded(&ws.output_path(recipe, time::at(16, 30)));
    assert_cell_approx_eq!(data.cells()[0], 6.0, 1e-3);
}

#[test]
fn test_reflectivity_interpolated_as_rate() {
    let ws = Workspace::new();
    // No echo, then 4 mm/h
    ws.write_rate(time::at(16, 0), 0.0);
    ws.write_rate(time::at(16, 10), 4.0);
    ws.write_rate(time::at(16, 20), 4.0);

    let extra = "quantity: reflectivity\nnowcast:\n  output_step_minutes: 5\n  end: 2024-07-01T16:10:00Z\n";
    let summary = ObsProcessor::new(ws.config(extra)).unwrap().run().unwrap();
    assert_eq!(summary.written, 6);

    let recipe = "%Y%m%d%H%M_interpolated.json";
    let (start, _) = decoded(&ws.output_path(recipe, time::at(16, 0)));
    assert_eq!(start.cells()[0], Cell::Undetect);

    // Half the rate, not half the dBZ
    let zr = ZrRelation::default();
    let (mid, _) = decoded(&ws.output_path(recipe, time::at(16, 5)));
    assert_cell_approx_eq!(mid.cells()[0], zr.rate_to_dbz(2.0), 1e-3);
}
