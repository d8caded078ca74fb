//! Duplicate resolution vocabulary
//!
//! Decisions returned by the user (or any other decision source) when a save
//! collides with records already in the library.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ts_rs::TS;

use super::media_record::VideoRecord;

/// Fields a user may pick individually during a field-level merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MergeField {
    Title,
    ViewCount,
    PlaylistLabel,
    PlotText,
}

impl MergeField {
    pub const ALL: [Self; 4] = [
        Self::Title,
        Self::ViewCount,
        Self::PlaylistLabel,
        Self::PlotText,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::ViewCount => "view_count",
            Self::PlaylistLabel => "playlist_label",
            Self::PlotText => "plot_text",
        }
    }
}

impl fmt::Display for MergeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown merge field '{0}'")]
pub struct MergeFieldError(pub String);

impl FromStr for MergeField {
    type Err = MergeFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(Self::Title),
            "view_count" | "viewcount" | "views" => Ok(Self::ViewCount),
            "playlist_label" | "playlistlabel" | "playlist" => Ok(Self::PlaylistLabel),
            "plot_text" | "plottext" | "plot" => Ok(Self::PlotText),
            _ => Err(MergeFieldError(s.to_string())),
        }
    }
}

/// Which side of a collision supplies a merged field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum FieldSource {
    Existing,
    #[default]
    Candidate,
}

/// Per-field source choice for a field-level merge.
///
/// Fields outside [`MergeField`] always come from the candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MergeSelection {
    pub title: FieldSource,
    pub view_count: FieldSource,
    pub playlist_label: FieldSource,
    pub plot_text: FieldSource,
}

impl MergeSelection {
    pub const fn all(source: FieldSource) -> Self {
        Self {
            title: source,
            view_count: source,
            playlist_label: source,
            plot_text: source,
        }
    }

    #[must_use]
    pub const fn with(mut self, field: MergeField, source: FieldSource) -> Self {
        match field {
            MergeField::Title => self.title = source,
            MergeField::ViewCount => self.view_count = source,
            MergeField::PlaylistLabel => self.playlist_label = source,
            MergeField::PlotText => self.plot_text = source,
        }
        self
    }

    pub const fn source_for(&self, field: MergeField) -> FieldSource {
        match field {
            MergeField::Title => self.title,
            MergeField::ViewCount => self.view_count,
            MergeField::PlaylistLabel => self.playlist_label,
            MergeField::PlotText => self.plot_text,
        }
    }

    /// Build a selection from named choices; unnamed fields default to the candidate.
    pub fn from_choices<I, S>(choices: I) -> Result<Self, MergeFieldError>
    where
        I: IntoIterator<Item = (S, FieldSource)>,
        S: AsRef<str>,
    {
        choices
            .into_iter()
            .try_fold(Self::default(), |selection, (name, source)| {
                let field = name.as_ref().parse::<MergeField>()?;
                Ok(selection.with(field, source))
            })
    }

    /// Merged record: candidate values overlaid with the chosen existing fields.
    pub fn apply(
        &self,
        existing: &VideoRecord,
        candidate: &VideoRecord,
        now: DateTime<Utc>,
    ) -> VideoRecord {
        let mut merged = existing.overwritten_by(candidate, now);
        for field in MergeField::ALL {
            if self.source_for(field) != FieldSource::Existing {
                continue;
            }
            match field {
                MergeField::Title => merged.title.clone_from(&existing.title),
                MergeField::ViewCount => merged.view_count = existing.view_count,
                MergeField::PlaylistLabel => {
                    merged.playlist_label.clone_from(&existing.playlist_label);
                }
                MergeField::PlotText => merged.plot_text.clone_from(&existing.plot_text),
            }
        }
        merged
    }
}

/// Resolution of a video save that collided with a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum VideoDecision {
    KeepExisting,
    OverwriteWithNew,
    FieldMerge { selection: MergeSelection },
    Dismiss,
}

/// Resolution of a bulk image save whose batch contains stored keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ImageDecision {
    SaveNewOnly,
    SaveAll,
    Dismiss,
}

/// What a single video save did to the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SaveAction {
    Inserted,
    KeptExisting,
    Updated,
    Dismissed,
}

impl SaveAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::KeptExisting => "kept_existing",
            Self::Updated => "updated",
            Self::Dismissed => "dismissed",
        }
    }

    pub const fn wrote(self) -> bool {
        matches!(self, Self::Inserted | Self::Updated)
    }
}

impl fmt::Display for SaveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
