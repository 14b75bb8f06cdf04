//! Monitoring attributes
//!
//! An [`AttributeSet`] is the full set of tunables the monitor exposes
//! through its `attrs` and `record` control entries. It is built either
//! from user input ([`AttributeSet::from_request`]) or by reading the
//! control surface ([`AttributeSet::from_surface`]) and is never mutated
//! afterwards.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::constants::{defaults, limits};
use crate::error::{RecordError, Result};
use crate::surface::ControlSurface;

/// User-supplied attribute values, before path resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrRequest {
    pub sample_interval_us: u64,
    pub aggr_interval_us: u64,
    pub regions_update_interval_us: u64,
    pub min_nr_regions: u64,
    pub max_nr_regions: u64,
    pub rbuf_len: u32,
    pub output_path: PathBuf,
}

impl Default for AttrRequest {
    fn default() -> Self {
        Self {
            sample_interval_us: defaults::SAMPLE_INTERVAL_US,
            aggr_interval_us: defaults::AGGR_INTERVAL_US,
            regions_update_interval_us: defaults::REGIONS_UPDATE_INTERVAL_US,
            min_nr_regions: defaults::MIN_NR_REGIONS,
            max_nr_regions: defaults::MAX_NR_REGIONS,
            rbuf_len: defaults::RBUF_LEN,
            output_path: PathBuf::from(defaults::OUTPUT_PATH),
        }
    }
}

/// Monitoring attributes as the control surface sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeSet {
    sample_interval_us: u64,
    aggr_interval_us: u64,
    regions_update_interval_us: u64,
    min_nr_regions: u64,
    max_nr_regions: u64,
    rbuf_len: u32,
    output_path: PathBuf,
}

impl AttributeSet {
    /// Build the requested attributes, resolving a relative output path
    /// against the current working directory.
    pub fn from_request(request: &AttrRequest) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => Self::from_request_in(request, &cwd),
            Err(e) => {
                log::warn!(
                    "cannot resolve working directory ({}), using {} as given",
                    e,
                    request.output_path.display()
                );
                Self::from_request_in(request, Path::new(""))
            }
        }
    }

    /// Build the requested attributes, resolving a relative output path
    /// against `base`.
    pub fn from_request_in(request: &AttrRequest, base: &Path) -> Self {
        let output_path = if request.output_path.is_absolute() {
            request.output_path.clone()
        } else {
            base.join(&request.output_path)
        };

        Self {
            sample_interval_us: request.sample_interval_us,
            aggr_interval_us: request.aggr_interval_us,
            regions_update_interval_us: request.regions_update_interval_us,
            min_nr_regions: request.min_nr_regions,
            max_nr_regions: request.max_nr_regions,
            rbuf_len: request.rbuf_len,
            output_path,
        }
    }

    /// Read the attributes currently configured on `surface`.
    pub fn from_surface<S: ControlSurface + ?Sized>(surface: &S) -> Result<Self> {
        let attrs_row = surface.read_attrs_row()?;
        let record_row = surface.read_record_row()?;
        Self::parse(&attrs_row, &record_row)
    }

    /// Parse the parameter row and the buffer row.
    ///
    /// The parameter row holds exactly five unsigned integers; the buffer row
    /// holds an unsigned integer followed by a path.
    pub fn parse(attrs_row: &str, record_row: &str) -> Result<Self> {
        let malformed_attrs = || RecordError::Parse {
            entry: "attrs",
            content: attrs_row.trim_end().to_string(),
        };
        let fields = attrs_row
            .split_whitespace()
            .map(|f| f.parse::<u64>().map_err(|_| malformed_attrs()))
            .collect::<Result<Vec<u64>>>()?;
        let [sample, aggr, updr, minr, maxr] = fields[..] else {
            return Err(malformed_attrs());
        };

        let malformed_record = || RecordError::Parse {
            entry: "record",
            content: record_row.trim_end().to_string(),
        };
        let mut record = record_row.split_whitespace();
        let rbuf_len = record
            .next()
            .and_then(|f| f.parse::<u32>().ok())
            .ok_or_else(malformed_record)?;
        let output_path = record.next().map(PathBuf::from).ok_or_else(malformed_record)?;
        if record.next().is_some() {
            return Err(malformed_record());
        }

        Ok(Self {
            sample_interval_us: sample,
            aggr_interval_us: aggr,
            regions_update_interval_us: updr,
            min_nr_regions: minr,
            max_nr_regions: maxr,
            rbuf_len,
            output_path,
        })
    }

    /// Reject values the monitor would refuse, before anything is written.
    pub fn validate(&self) -> Result<()> {
        if self.min_nr_regions < limits::MIN_NR_REGIONS_FLOOR {
            return Err(RecordError::InvalidAttributes(format!(
                "min_nr_regions ({}) should be at least {}",
                self.min_nr_regions,
                limits::MIN_NR_REGIONS_FLOOR
            )));
        }
        if self.min_nr_regions > self.max_nr_regions {
            return Err(RecordError::InvalidAttributes(format!(
                "min_nr_regions ({}) exceeds max_nr_regions ({})",
                self.min_nr_regions, self.max_nr_regions
            )));
        }
        if self.rbuf_len > limits::MAX_RBUF_LEN {
            return Err(RecordError::InvalidAttributes(format!(
                "result buffer length ({}) exceeds {}",
                self.rbuf_len,
                limits::MAX_RBUF_LEN
            )));
        }

        let path_len = self.output_path.as_os_str().len();
        if path_len >= limits::MAX_OUTPUT_PATH_LEN {
            return Err(RecordError::InvalidAttributes(format!(
                "output path is {} bytes long, limit is {}",
                path_len,
                limits::MAX_OUTPUT_PATH_LEN - 1
            )));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(RecordError::InvalidAttributes(
                "output path is empty".to_string(),
            ));
        }
        // the buffer row is split on whitespace, and only text goes through
        let Some(path) = self.output_path.to_str() else {
            return Err(RecordError::InvalidAttributes(format!(
                "output path {} is not valid UTF-8",
                self.output_path.display()
            )));
        };
        if path.chars().any(|c| c.is_ascii_whitespace()) {
            return Err(RecordError::InvalidAttributes(format!(
                "output path '{}' contains whitespace",
                path
            )));
        }
        match self.output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
                Err(RecordError::InvalidAttributes(format!(
                    "output directory {} does not exist",
                    parent.display()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Write the parameter row, then the buffer row.
    ///
    /// Stops at the first failure; the buffer row is not attempted if the
    /// parameter row was refused.
    pub fn apply_to<S: ControlSurface + ?Sized>(&self, surface: &mut S) -> Result<()> {
        surface.write_attrs_row(&self.attrs_row())?;
        surface.write_record_row(&self.record_row())
    }

    /// Parameter row: `sample aggr updr minr maxr`
    pub fn attrs_row(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.sample_interval_us,
            self.aggr_interval_us,
            self.regions_update_interval_us,
            self.min_nr_regions,
            self.max_nr_regions
        )
    }

    /// Buffer row: `rbuf_len path`
    pub fn record_row(&self) -> String {
        format!("{} {}", self.rbuf_len, self.output_path.display())
    }

    pub fn sample_interval_us(&self) -> u64 {
        self.sample_interval_us
    }

    pub fn aggr_interval_us(&self) -> u64 {
        self.aggr_interval_us
    }

    pub fn regions_update_interval_us(&self) -> u64 {
        self.regions_update_interval_us
    }

    pub fn min_nr_regions(&self) -> u64 {
        self.min_nr_regions
    }

    pub fn max_nr_regions(&self) -> u64 {
        self.max_nr_regions
    }

    pub fn rbuf_len(&self) -> u32 {
        self.rbuf_len
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

impl fmt::Display for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sample={}us aggr={}us updr={}us minr={} maxr={} rbuf={} out={}",
            self.sample_interval_us,
            self.aggr_interval_us,
            self.regions_update_interval_us,
            self.min_nr_regions,
            self.max_nr_regions,
            self.rbuf_len,
            self.output_path.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn request(out: &str) -> AttrRequest {
        AttrRequest {
            output_path: PathBuf::from(out),
            ..AttrRequest::default()
        }
    }

    // Records writes in order and refuses the parameter row when asked to.
    #[derive(Default)]
    struct RowLog {
        writes: RefCell<Vec<(&'static str, String)>>,
        refuse_attrs: bool,
    }

    impl ControlSurface for RowLog {
        fn read_attrs_row(&self) -> Result<String> {
            Ok("5000 100000 1000000 10 1000\n".to_string())
        }
        fn read_record_row(&self) -> Result<String> {
            Ok("1048576 /damon.data\n".to_string())
        }
        fn write_attrs_row(&mut self, row: &str) -> Result<()> {
            if self.refuse_attrs {
                return Err(RecordError::ControlWrite {
                    path: PathBuf::from("attrs"),
                    value: row.to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
                });
            }
            self.writes.borrow_mut().push(("attrs", row.to_string()));
            Ok(())
        }
        fn write_record_row(&mut self, row: &str) -> Result<()> {
            self.writes.borrow_mut().push(("record", row.to_string()));
            Ok(())
        }
        fn set_target(&mut self, _pid: u64) -> Result<()> {
            Ok(())
        }
        fn turn_on(&mut self) -> Result<()> {
            Ok(())
        }
        fn turn_off(&mut self) -> Result<()> {
            Ok(())
        }
        fn is_running(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_relative_output_resolved_against_base() {
        let attrs = AttributeSet::from_request_in(&request("damon.data"), Path::new("/work"));
        assert_eq!(attrs.output_path(), Path::new("/work/damon.data"));
    }

    #[test]
    fn test_absolute_output_kept() {
        let attrs = AttributeSet::from_request_in(&request("/tmp/d.data"), Path::new("/work"));
        assert_eq!(attrs.output_path(), Path::new("/tmp/d.data"));
    }

    #[test]
    fn test_rows() {
        let attrs = AttributeSet::from_request_in(&request("/tmp/d.data"), Path::new("/"));
        assert_eq!(attrs.attrs_row(), "5000 100000 1000000 10 1000");
        assert_eq!(attrs.record_row(), "1048576 /tmp/d.data");
    }

    #[test]
    fn test_display_names_every_field() {
        let attrs = AttributeSet::from_request_in(&request("/tmp/d.data"), Path::new("/"));
        assert_eq!(
            attrs.to_string(),
            "sample=5000us aggr=100000us updr=1000000us minr=10 maxr=1000 rbuf=1048576 out=/tmp/d.data"
        );
    }

    #[test]
    fn test_parse_kernel_rendering() {
        let attrs = AttributeSet::parse("5000 100000 1000000 10 1000\n", "1048576 /damon.data\n")
            .unwrap();
        assert_eq!(attrs.sample_interval_us(), 5000);
        assert_eq!(attrs.aggr_interval_us(), 100_000);
        assert_eq!(attrs.regions_update_interval_us(), 1_000_000);
        assert_eq!(attrs.min_nr_regions(), 10);
        assert_eq!(attrs.max_nr_regions(), 1000);
        assert_eq!(attrs.rbuf_len(), 1_048_576);
        assert_eq!(attrs.output_path(), Path::new("/damon.data"));
    }

    #[test]
    fn test_parse_rejects_short_attrs_row() {
        let err = AttributeSet::parse("5000 100000 1000000 10\n", "1048576 /damon.data\n")
            .unwrap_err();
        assert!(matches!(err, RecordError::Parse { entry: "attrs", .. }));
    }

    #[test]
    fn test_parse_rejects_non_numeric_attrs() {
        let err = AttributeSet::parse("5000 x 1000000 10 1000", "1048576 /damon.data").unwrap_err();
        assert!(matches!(err, RecordError::Parse { entry: "attrs", .. }));
    }

    #[test]
    fn test_parse_rejects_record_without_path() {
        let err = AttributeSet::parse("5000 100000 1000000 10 1000", "1048576 \n").unwrap_err();
        assert!(matches!(err, RecordError::Parse { entry: "record", .. }));
    }

    #[test]
    fn test_from_surface_round_trips_rows() {
        let surface = RowLog::default();
        let attrs = AttributeSet::from_surface(&surface).unwrap();
        assert_eq!(attrs.attrs_row(), "5000 100000 1000000 10 1000");
        assert_eq!(attrs.record_row(), "1048576 /damon.data");
    }

    #[test]
    fn test_apply_writes_attrs_before_record() {
        let mut surface = RowLog::default();
        let attrs = AttributeSet::from_request_in(&request("/tmp/d.data"), Path::new("/"));
        attrs.apply_to(&mut surface).unwrap();

        let writes = surface.writes.borrow();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].0, "attrs");
        assert_eq!(writes[1], ("record", "1048576 /tmp/d.data".to_string()));
    }

    #[test]
    fn test_apply_stops_after_attrs_failure() {
        let mut surface = RowLog {
            refuse_attrs: true,
            ..RowLog::default()
        };
        let attrs = AttributeSet::from_request_in(&request("/tmp/d.data"), Path::new("/"));
        let err = attrs.apply_to(&mut surface).unwrap_err();
        assert!(matches!(err, RecordError::ControlWrite { .. }));
        assert!(surface.writes.borrow().is_empty(), "record row must not be written");
    }

    #[test]
    fn test_validate_defaults() {
        let attrs = AttributeSet::from_request_in(&request("/tmp/d.data"), Path::new("/"));
        assert!(attrs.validate().is_ok());
    }

    #[test]
    fn test_validate_min_above_max() {
        let req = AttrRequest {
            min_nr_regions: 2000,
            ..request("/tmp/d.data")
        };
        let err = AttributeSet::from_request_in(&req, Path::new("/")).validate().unwrap_err();
        assert!(err.to_string().contains("exceeds max_nr_regions"));
    }

    #[test]
    fn test_validate_min_floor() {
        let req = AttrRequest {
            min_nr_regions: 2,
            ..request("/tmp/d.data")
        };
        assert!(AttributeSet::from_request_in(&req, Path::new("/")).validate().is_err());
    }

    #[test]
    fn test_validate_rbuf_ceiling() {
        let req = AttrRequest {
            rbuf_len: limits::MAX_RBUF_LEN + 1,
            ..request("/tmp/d.data")
        };
        assert!(AttributeSet::from_request_in(&req, Path::new("/")).validate().is_err());
    }

    #[test]
    fn test_validate_missing_parent_dir() {
        let attrs = AttributeSet::from_request_in(
            &request("/nonexistent-damon-dir/d.data"),
            Path::new("/"),
        );
        let err = attrs.validate().unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_validate_long_path() {
        let long = format!("/tmp/{}", "a".repeat(limits::MAX_OUTPUT_PATH_LEN));
        let attrs = AttributeSet::from_request_in(&request(&long), Path::new("/"));
        assert!(attrs.validate().is_err());
    }

    #[test]
    fn test_validate_whitespace_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("two words");
        std::fs::create_dir(&dir).unwrap();
        for name in ["d.data", "d\tdata"] {
            let attrs = AttributeSet::from_request_in(&request(name), &dir);
            let err = attrs.validate().unwrap_err();
            assert!(matches!(err, RecordError::InvalidAttributes(_)), "{name:?}");
            assert_eq!(err.exit_code(), 1);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_non_utf8_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let out = Path::new("/tmp").join(OsStr::from_bytes(b"d\xff.data"));
        let req = AttrRequest {
            output_path: out,
            ..AttrRequest::default()
        };
        let err = AttributeSet::from_request_in(&req, Path::new("/")).validate().unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn test_validated_record_row_parses_back() {
        let attrs = AttributeSet::from_request_in(&request("/tmp/d.data"), Path::new("/"));
        attrs.validate().unwrap();
        let reparsed = AttributeSet::parse(&attrs.attrs_row(), &attrs.record_row()).unwrap();
        assert_eq!(reparsed, attrs);
    }
}
