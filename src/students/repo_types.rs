use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::StoreError;

/// Strand label stamped on every learner of the alternative track.
pub const ALS_STRAND: &str = "ALS";

/// Which student table a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    #[default]
    General,
    Als,
}

impl Track {
    pub fn table(self) -> &'static str {
        match self {
            Track::General => "students",
            Track::Als => "als_students",
        }
    }

    /// The ALS table has no strand column.
    pub fn has_strand(self) -> bool {
        matches!(self, Track::General)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrollmentStatus {
    Pending,
    Enrolled,
}

impl EnrollmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "Pending",
            EnrollmentStatus::Enrolled => "Enrolled",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(EnrollmentStatus::Pending),
            "Enrolled" => Ok(EnrollmentStatus::Enrolled),
            other => Err(StoreError::Backend(format!(
                "unknown enrollment status {other:?}"
            ))),
        }
    }
}

/// A learner keyed by LRN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub lrn: String,
    pub lname: String,
    pub fname: String,
    pub mname: String,
    pub strand: Option<String>,
    pub enrollment_status: EnrollmentStatus,
    pub four_ps: Option<String>,
}

/// Raw row as stored; the status column is plain text.
#[derive(Debug, FromRow)]
pub struct StudentRow {
    pub lrn: String,
    pub lname: String,
    pub fname: String,
    pub mname: Option<String>,
    pub strand: Option<String>,
    pub enrollment_status: String,
    pub four_ps: Option<String>,
}

impl TryFrom<StudentRow> for Student {
    type Error = StoreError;

    fn try_from(r: StudentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            enrollment_status: r.enrollment_status.parse()?,
            lrn: r.lrn,
            lname: r.lname,
            fname: r.fname,
            mname: r.mname.unwrap_or_default(),
            strand: r.strand,
            four_ps: r.four_ps,
        })
    }
}

/// Fields accepted when a student is added. New rows always start `Pending`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    pub lrn: String,
    pub lname: String,
    pub fname: String,
    #[serde(default)]
    pub mname: String,
    #[serde(default)]
    pub strand: Option<String>,
    #[serde(default)]
    pub four_ps: Option<String>,
}

impl NewStudent {
    pub fn into_pending(self, track: Track) -> Student {
        Student {
            lrn: self.lrn,
            lname: self.lname,
            fname: self.fname,
            mname: self.mname,
            strand: if track.has_strand() {
                self.strand
            } else {
                Some(ALS_STRAND.to_string())
            },
            enrollment_status: EnrollmentStatus::Pending,
            four_ps: self.four_ps,
        }
    }
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentUpdate {
    pub lname: Option<String>,
    pub fname: Option<String>,
    pub mname: Option<String>,
    pub strand: Option<String>,
    pub enrollment_status: Option<EnrollmentStatus>,
    pub four_ps: Option<String>,
}

impl StudentUpdate {
    pub fn is_empty(&self) -> bool {
        self.lname.is_none()
            && self.fname.is_none()
            && self.mname.is_none()
            && self.strand.is_none()
            && self.enrollment_status.is_none()
            && self.four_ps.is_none()
    }

    pub fn apply(&self, track: Track, s: &mut Student) {
        if let Some(v) = &self.lname {
            s.lname = v.clone();
        }
        if let Some(v) = &self.fname {
            s.fname = v.clone();
        }
        if let Some(v) = &self.mname {
            s.mname = v.clone();
        }
        if let (true, Some(v)) = (track.has_strand(), &self.strand) {
            s.strand = Some(v.clone());
        }
        if let Some(v) = self.enrollment_status {
            s.enrollment_status = v;
        }
        if let Some(v) = &self.four_ps {
            s.four_ps = Some(v.clone());
        }
    }
}
