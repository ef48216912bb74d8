//! CSV output for sampled reference points

use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::vector::ReferencePoint;

const HEADER: [&str; 6] = ["id", "class", "class_name", "x", "y", "label"];

/// One exported row. `label` is left blank for manual labelling.
#[derive(Debug, Serialize)]
struct PointRow<'a> {
    id: Option<u64>,
    class: Option<u8>,
    class_name: Option<&'static str>,
    x: f64,
    y: f64,
    label: &'a str,
}

impl<'a> From<&'a ReferencePoint> for PointRow<'a> {
    fn from(p: &'a ReferencePoint) -> Self {
        Self {
            id: p.id,
            class: p.sampled_class.map(|c| c.code()),
            class_name: p.sampled_class.map(|c| c.label()),
            x: p.x,
            y: p.y,
            label: p.label.as_deref().unwrap_or(""),
        }
    }
}

/// Write points as `id,class,class_name,x,y,label` to any writer
pub fn write_points<W: Write>(points: &[ReferencePoint], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    // serialize() only emits the header along with the first record
    if points.is_empty() {
        wtr.write_record(HEADER)?;
    }
    for p in points {
        wtr.serialize(PointRow::from(p))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_points_csv<P: AsRef<Path>>(points: &[ReferencePoint], path: P) -> Result<()> {
    let file = std::fs::File::create(path.as_ref())?;
    write_points(points, std::io::BufWriter::new(file))
}
