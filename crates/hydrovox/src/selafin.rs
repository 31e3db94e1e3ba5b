//! Selafin (Telemac) result files.
//!
//! A Selafin file is a sequence of big-endian Fortran records, each payload
//! framed by its byte length as a `u32` before and after:
//!
//! ```text
//! title (80 bytes)
//! nbv1 nbv2
//! nbv1 + nbv2 variable records (16-byte name, 16-byte unit)
//! iparam (10 x i32)        iparam[6] = number of planes
//! date (6 x i32)           only if iparam[9] == 1
//! nelem npoin ndp 1
//! ikle (nelem * ndp x i32)
//! ipobo (npoin x i32)
//! x (npoin floats), y (npoin floats)
//! per time step: time (1 float), then one record of npoin floats per variable
//! ```
//!
//! Floats are `f32` or `f64`; the width is taken from the coordinate record.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use hydrovox_core::{FieldSet, MeshSampler, Result, SimulationReader, VoxelError};

const NAME_WIDTH: usize = 16;
const VARIABLE_RECORD: usize = 2 * NAME_WIDTH;
const TITLE_WIDTH: usize = 80;

/// Float width of the value records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Single,
    Double,
}

impl Precision {
    #[must_use]
    pub fn width(self) -> usize {
        match self {
            Self::Single => 4,
            Self::Double => 8,
        }
    }

    fn from_record(len: usize, count: usize) -> Result<Self> {
        match len.checked_div(count) {
            Some(4) if len % count == 0 => Ok(Self::Single),
            Some(8) if len % count == 0 => Ok(Self::Double),
            _ => Err(VoxelError::FormatError(format!(
                "coordinate record of {len} bytes does not hold {count} floats"
            ))),
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Single => "SERAFIN ",
            Self::Double => "SERAFIND",
        }
    }
}

/// Lazily reads time records from a Selafin stream.
///
/// The header and the position of every time record are scanned on open;
/// values are only decoded by [`SimulationReader::read`].
pub struct SelafinReader<R = BufReader<File>> {
    source: R,
    title: String,
    variables: Vec<String>,
    units: Vec<String>,
    precision: Precision,
    point_count: usize,
    plane_count: usize,
    x: Vec<f64>,
    y: Vec<f64>,
    times: Vec<f64>,
    offsets: Vec<u64>,
}

impl SelafinReader {
    /// Opens a Selafin file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VoxelError::FileNotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        log::debug!("opening selafin file {}", path.display());
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> SelafinReader<R> {
    /// Parses the header and indexes the time records of `source`.
    pub fn from_reader(mut source: R) -> Result<Self> {
        let end = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;

        let title_record = read_record(&mut source, "title")?;
        if title_record.len() != TITLE_WIDTH {
            return Err(VoxelError::FormatError(format!(
                "title record is {} bytes, expected {TITLE_WIDTH}",
                title_record.len()
            )));
        }
        let title = String::from_utf8_lossy(&title_record[..TITLE_WIDTH - 8])
            .trim_end()
            .to_string();

        let counts = read_ints(&mut source, "variable counts", Some(2))?;
        let variable_count = usize::try_from(i64::from(counts[0]) + i64::from(counts[1]))
            .map_err(|_| VoxelError::FormatError("negative variable count".into()))?;

        let mut variables = Vec::with_capacity(variable_count);
        let mut units = Vec::with_capacity(variable_count);
        for _ in 0..variable_count {
            let record = read_record(&mut source, "variable name")?;
            if record.len() != VARIABLE_RECORD {
                return Err(VoxelError::FormatError(format!(
                    "variable record is {} bytes, expected {VARIABLE_RECORD}",
                    record.len()
                )));
            }
            let (name, unit) = record.split_at(NAME_WIDTH);
            variables.push(String::from_utf8_lossy(name).trim().to_string());
            units.push(String::from_utf8_lossy(unit).trim().to_string());
        }

        let iparam = read_ints(&mut source, "iparam", Some(10))?;
        if iparam[9] == 1 {
            read_ints(&mut source, "date", Some(6))?;
        }
        let plane_count = usize::try_from(iparam[6].max(1))
            .map_err(|_| VoxelError::FormatError("invalid plane count".into()))?;

        let sizes = read_ints(&mut source, "mesh sizes", Some(4))?;
        let point_count = usize::try_from(sizes[1])
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| VoxelError::FormatError(format!("invalid point count {}", sizes[1])))?;
        if point_count % plane_count != 0 {
            return Err(VoxelError::FormatError(format!(
                "{point_count} points do not split into {plane_count} planes"
            )));
        }

        skip_record(&mut source, "ikle")?;
        skip_record(&mut source, "ipobo")?;

        let x_record = read_record(&mut source, "x")?;
        let precision = Precision::from_record(x_record.len(), point_count)?;
        let y_record = read_record(&mut source, "y")?;
        if y_record.len() != x_record.len() {
            return Err(VoxelError::FormatError("x and y records differ in size".into()));
        }
        let vertices_per_plane = point_count / plane_count;
        let mut x = decode_floats(&x_record, precision);
        let mut y = decode_floats(&y_record, precision);
        x.truncate(vertices_per_plane);
        y.truncate(vertices_per_plane);

        let value_bytes = point_count * precision.width();
        let (mut times, mut offsets) = (Vec::new(), Vec::new());
        while source.stream_position()? < end {
            let time_record = read_record(&mut source, "time")?;
            if time_record.len() != precision.width() {
                return Err(VoxelError::FormatError(format!(
                    "time record {} is {} bytes",
                    times.len(),
                    time_record.len()
                )));
            }
            offsets.push(source.stream_position()?);
            times.push(decode_floats(&time_record, precision)[0]);
            for _ in 0..variable_count {
                let len = skip_record(&mut source, "variable values")?;
                if len != value_bytes {
                    return Err(VoxelError::FormatError(format!(
                        "time record {} holds {len} bytes per variable, expected {value_bytes}",
                        times.len() - 1
                    )));
                }
            }
        }

        log::info!(
            "selafin '{}': {} variables, {} points on {} planes, {} time records ({:?})",
            title,
            variables.len(),
            point_count,
            plane_count,
            times.len(),
            precision
        );

        Ok(Self {
            source,
            title,
            variables,
            units,
            precision,
            point_count,
            plane_count,
            x,
            y,
            times,
            offsets,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Trimmed variable names in file order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }
}

impl<R: Read + Seek> SimulationReader for SelafinReader<R> {
    fn time_records(&self) -> &[f64] {
        &self.times
    }

    fn read(&mut self, index: usize) -> Result<FieldSet> {
        let offset = *self.offsets.get(index).ok_or(VoxelError::IndexOutOfRange {
            index,
            len: self.offsets.len(),
        })?;
        self.source.seek(SeekFrom::Start(offset))?;

        let mut fields = FieldSet::with_capacity(self.variables.len());
        for name in &self.variables {
            let record = read_record(&mut self.source, "variable values")?;
            let values = decode_floats(&record, self.precision);
            if values.len() != self.point_count {
                return Err(VoxelError::SizeMismatch {
                    expected: self.point_count,
                    actual: values.len(),
                });
            }
            fields.insert(name.clone(), values);
        }
        Ok(fields)
    }

    fn raw_plane_count(&self) -> usize {
        self.plane_count
    }

    fn vertices_per_plane(&self) -> usize {
        self.x.len()
    }

    fn x(&self) -> &[f64] {
        &self.x
    }

    fn y(&self) -> &[f64] {
        &self.y
    }
}

/// Opens a Selafin file and loads it into a [`MeshSampler`].
pub fn open_selafin(
    path: impl AsRef<Path>,
    plane_interp_steps: usize,
    time_interp_steps: usize,
) -> Result<MeshSampler<SelafinReader>> {
    MeshSampler::load(SelafinReader::open(path)?, plane_interp_steps, time_interp_steps)
}

fn truncated(what: &str) -> VoxelError {
    VoxelError::FormatError(format!("unexpected end of file in {what} record"))
}

fn read_marker<R: Read>(source: &mut R, what: &str) -> Result<usize> {
    match source.read_u32::<BigEndian>() {
        Ok(len) => Ok(len as usize),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(truncated(what)),
        Err(e) => Err(e.into()),
    }
}

fn check_trailer<R: Read>(source: &mut R, what: &str, len: usize) -> Result<()> {
    let trailer = read_marker(source, what)?;
    if trailer != len {
        return Err(VoxelError::FormatError(format!(
            "{what} record markers disagree ({len} vs {trailer})"
        )));
    }
    Ok(())
}

fn read_record<R: Read>(source: &mut R, what: &str) -> Result<Vec<u8>> {
    let len = read_marker(source, what)?;
    let mut payload = Vec::new();
    source.by_ref().take(len as u64).read_to_end(&mut payload)?;
    if payload.len() != len {
        return Err(truncated(what));
    }
    check_trailer(source, what, len)?;
    Ok(payload)
}

/// Skips one record and returns its payload length.
fn skip_record<R: Read + Seek>(source: &mut R, what: &str) -> Result<usize> {
    let len = read_marker(source, what)?;
    let skip = i64::try_from(len).map_err(|_| truncated(what))?;
    source.seek(SeekFrom::Current(skip))?;
    check_trailer(source, what, len)?;
    Ok(len)
}

fn read_ints<R: Read>(source: &mut R, what: &str, count: Option<usize>) -> Result<Vec<i32>> {
    let record = read_record(source, what)?;
    if record.len() % 4 != 0 || count.is_some_and(|n| record.len() != n * 4) {
        return Err(VoxelError::FormatError(format!(
            "{what} record has unexpected size {}",
            record.len()
        )));
    }
    Ok(record.chunks_exact(4).map(BigEndian::read_i32).collect())
}

fn decode_floats(bytes: &[u8], precision: Precision) -> Vec<f64> {
    match precision {
        Precision::Single => bytes
            .chunks_exact(4)
            .map(|chunk| f64::from(BigEndian::read_f32(chunk)))
            .collect(),
        Precision::Double => bytes.chunks_exact(8).map(BigEndian::read_f64).collect(),
    }
}

/// In-memory description of a Selafin file, for producing inputs.
///
/// Connectivity is not retained by the reader, so files are written without
/// elements.
#[derive(Debug, Clone, Default)]
pub struct SelafinFile {
    pub title: String,
    pub precision: Precision,
    pub plane_count: usize,
    /// Planar x coordinates (one plane).
    pub x: Vec<f64>,
    /// Planar y coordinates (one plane).
    pub y: Vec<f64>,
    pub variables: Vec<String>,
    pub date: Option<[i32; 6]>,
    /// `(time, values)` with one `x.len() * plane_count` vector per variable.
    pub records: Vec<(f64, Vec<Vec<f64>>)>,
}

impl SelafinFile {
    /// Writes the file to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.write_to(&mut out)?;
        out.flush()?;
        Ok(())
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        if self.x.len() != self.y.len() {
            return Err(VoxelError::SizeMismatch {
                expected: self.x.len(),
                actual: self.y.len(),
            });
        }
        let plane_count = self.plane_count.max(1);
        let point_count = self.x.len() * plane_count;
        let to_i32 = |n: usize| {
            i32::try_from(n).map_err(|_| VoxelError::FormatError(format!("{n} does not fit a record")))
        };

        let mut title = format!("{:<width$}", self.title, width = TITLE_WIDTH - 8);
        title.truncate(TITLE_WIDTH - 8);
        title.push_str(self.precision.tag());
        write_record(out, title.as_bytes())?;

        write_record(out, &ints(&[to_i32(self.variables.len())?, 0])?)?;
        for name in &self.variables {
            let mut padded = format!("{name:<width$}", width = NAME_WIDTH);
            padded.truncate(NAME_WIDTH);
            padded.push_str(&" ".repeat(NAME_WIDTH));
            write_record(out, padded.as_bytes())?;
        }

        let mut iparam = [0_i32; 10];
        iparam[0] = 1;
        if plane_count > 1 {
            iparam[6] = to_i32(plane_count)?;
        }
        if self.date.is_some() {
            iparam[9] = 1;
        }
        write_record(out, &ints(&iparam)?)?;
        if let Some(date) = self.date {
            write_record(out, &ints(&date)?)?;
        }

        let ndp = if plane_count > 1 { 6 } else { 3 };
        write_record(out, &ints(&[0, to_i32(point_count)?, ndp, 1])?)?;
        write_record(out, &[])?;
        write_record(out, &ints(&vec![0; point_count])?)?;

        let replicate = |coords: &[f64]| -> Vec<f64> {
            coords.iter().copied().cycle().take(point_count).collect()
        };
        write_record(out, &self.floats(&replicate(&self.x))?)?;
        write_record(out, &self.floats(&replicate(&self.y))?)?;

        for (time, values) in &self.records {
            if values.len() != self.variables.len() {
                return Err(VoxelError::SizeMismatch {
                    expected: self.variables.len(),
                    actual: values.len(),
                });
            }
            write_record(out, &self.floats(&[*time])?)?;
            for variable in values {
                if variable.len() != point_count {
                    return Err(VoxelError::SizeMismatch {
                        expected: point_count,
                        actual: variable.len(),
                    });
                }
                write_record(out, &self.floats(variable)?)?;
            }
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn floats(&self, values: &[f64]) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(values.len() * self.precision.width());
        for &value in values {
            match self.precision {
                Precision::Single => bytes.write_f32::<BigEndian>(value as f32)?,
                Precision::Double => bytes.write_f64::<BigEndian>(value)?,
            }
        }
        Ok(bytes)
    }
}

fn ints(values: &[i32]) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for &value in values {
        bytes.write_i32::<BigEndian>(value)?;
    }
    Ok(bytes)
}

fn write_record<W: Write>(out: &mut W, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len())
        .map_err(|_| VoxelError::FormatError(format!("record of {} bytes", payload.len())))?;
    out.write_u32::<BigEndian>(len)?;
    out.write_all(payload)?;
    out.write_u32::<BigEndian>(len)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn layered_file(precision: Precision) -> SelafinFile {
        // 3 vertices, 2 planes, elevation rises by 1 per plane and 0.5 per record
        let records = (0..3_i32)
            .map(|t| {
                let t = f64::from(t);
                let z = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0].map(|base| base + t * 0.5).to_vec();
                let u = (0..6_i32).map(|i| f64::from(i) + 10.0 * t).collect();
                (t * 60.0, vec![z, u])
            })
            .collect();
        SelafinFile {
            title: "layered test".into(),
            precision,
            plane_count: 2,
            x: vec![0.0, 1.0, 0.0],
            y: vec![0.0, 0.0, 1.0],
            variables: vec!["ELEVATION Z".into(), "VELOCITY U".into()],
            date: None,
            records,
        }
    }

    fn encode(file: &SelafinFile) -> Vec<u8> {
        let mut bytes = Vec::new();
        file.write_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_header_and_layers() {
        let reader = SelafinReader::from_reader(Cursor::new(encode(&layered_file(Precision::Single))))
            .unwrap();
        assert_eq!(reader.title(), "layered test");
        assert_eq!(reader.variables(), &["ELEVATION Z", "VELOCITY U"]);
        assert_eq!(reader.precision(), Precision::Single);
        assert_eq!(reader.raw_plane_count(), 2);
        assert_eq!(reader.vertices_per_plane(), 3);
        assert_eq!(reader.x(), &[0.0, 1.0, 0.0]);
        assert_eq!(reader.time_records(), &[0.0, 60.0, 120.0]);
    }

    #[test]
    fn test_read_record_values() {
        let mut reader =
            SelafinReader::from_reader(Cursor::new(encode(&layered_file(Precision::Double))))
                .unwrap();
        assert_eq!(reader.precision(), Precision::Double);

        let fields = reader.read(2).unwrap();
        assert_eq!(fields["VELOCITY U"], vec![20.0, 21.0, 22.0, 23.0, 24.0, 25.0]);
        assert_eq!(fields["ELEVATION Z"][3], 2.0);

        // random access back to an earlier record
        let fields = reader.read(0).unwrap();
        assert_eq!(fields["VELOCITY U"][5], 5.0);
        assert!(matches!(
            reader.read(3),
            Err(VoxelError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_date_record_is_skipped() {
        let mut file = layered_file(Precision::Single);
        file.date = Some([2024, 5, 1, 12, 0, 0]);
        let reader = SelafinReader::from_reader(Cursor::new(encode(&file))).unwrap();
        assert_eq!(reader.time_records().len(), 3);
    }

    #[test]
    fn test_truncated_file_is_format_error() {
        let mut bytes = encode(&layered_file(Precision::Single));
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(
            SelafinReader::from_reader(Cursor::new(bytes)),
            Err(VoxelError::FormatError(_))
        ));
    }

    #[test]
    fn test_corrupt_marker_is_format_error() {
        let mut bytes = encode(&layered_file(Precision::Single));
        // trailing marker of the title record
        bytes[4 + TITLE_WIDTH] ^= 0xff;
        assert!(matches!(
            SelafinReader::from_reader(Cursor::new(bytes)),
            Err(VoxelError::FormatError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            SelafinReader::open("/nonexistent/run.slf"),
            Err(VoxelError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_sampler_over_selafin() {
        let reader =
            SelafinReader::from_reader(Cursor::new(encode(&layered_file(Precision::Single))))
                .unwrap();
        let mut sampler = MeshSampler::load(reader, 1, 1).unwrap();
        assert_eq!(sampler.total_plane_count(), 3);

        sampler.set_time_point(0, 1).unwrap();
        let u = sampler.get_field(&["VELOCITY U"]).unwrap();
        // halfway to record 1 (+5), middle plane averages planes 0 and 1
        assert_eq!(u.len(), 9);
        assert_eq!(u[0], 5.0);
        assert_eq!(u[3], 6.5);
        assert_eq!(u[6], 8.0);
    }
}
