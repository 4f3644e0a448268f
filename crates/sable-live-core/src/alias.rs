//! Field-name aliasing.
//!
//! The same logical column shows up under different literal names depending
//! on the source: a bib number may be `Numero`, `N°`, `Num` or `Dossard`.
//! Each [`LogicalField`] carries an ordered list of candidate names; the
//! first candidate present in a record (compared case-insensitively, ignoring
//! surrounding whitespace) wins.
//!
//! [`ResolvedFields`] resolves all logical fields of one record in a single
//! pass so query code never repeats string comparisons.

use crate::models::PilotRecord;

/// A semantic column of the results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalField {
    Position,
    Number,
    Name,
    Time,
    Gap,
}

impl LogicalField {
    /// Positional order used for HTML rows without header names.
    pub const ALL: [LogicalField; 5] = [
        LogicalField::Position,
        LogicalField::Number,
        LogicalField::Name,
        LogicalField::Time,
        LogicalField::Gap,
    ];

    /// Field name given to an HTML cell at this column index when the table
    /// has no header row.
    pub fn positional_name(self) -> &'static str {
        match self {
            LogicalField::Position => "position",
            LogicalField::Number => "number",
            LogicalField::Name => "name",
            LogicalField::Time => "time",
            LogicalField::Gap => "gap",
        }
    }

    /// Logical field for an HTML column index, if the index is one of the
    /// five named positions.
    pub fn at_index(idx: usize) -> Option<LogicalField> {
        Self::ALL.get(idx).copied()
    }

    /// Candidate literal names, most specific first.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            LogicalField::Position => &[
                "Position",
                "Pos",
                "Pos.",
                "Rang",
                "Clt",
                "Clt.",
                "Classement",
                "Place",
                "Rank",
            ],
            LogicalField::Number => &[
                "Numero", "N°", "Num", "Dossard", "Numéro", "No", "N", "#", "Number", "Bib",
            ],
            LogicalField::Name => &[
                "Nom",
                "Pilote",
                "Nom Pilote",
                "Nom Prénom",
                "Concurrent",
                "Name",
                "Rider",
                "Driver",
            ],
            LogicalField::Time => &[
                "Meilleur Tour",
                "Meilleur temps",
                "Best",
                "Best Lap",
                "Temps",
                "Tps",
                "Time",
            ],
            LogicalField::Gap => &["Ecart", "Écart", "Gap", "Diff", "Diff."],
        }
    }

    /// Resolves this field against a single record.
    pub fn resolve(self, record: &PilotRecord) -> Option<&str> {
        let names: Vec<(String, &str)> = record
            .fields()
            .map(|(k, v)| (fold(k), v))
            .collect();
        lookup(&names, self)
    }
}

/// All logical fields of one record, resolved once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedFields<'a> {
    pub position: Option<&'a str>,
    pub number: Option<&'a str>,
    pub name: Option<&'a str>,
    pub time: Option<&'a str>,
    pub gap: Option<&'a str>,
}

impl<'a> ResolvedFields<'a> {
    pub fn of(record: &'a PilotRecord) -> Self {
        let names: Vec<(String, &'a str)> = record
            .fields()
            .map(|(k, v)| (fold(k), v))
            .collect();
        Self {
            position: lookup(&names, LogicalField::Position),
            number: lookup(&names, LogicalField::Number),
            name: lookup(&names, LogicalField::Name),
            time: lookup(&names, LogicalField::Time),
            gap: lookup(&names, LogicalField::Gap),
        }
    }
}

fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}

fn lookup<'a>(names: &[(String, &'a str)], field: LogicalField) -> Option<&'a str> {
    field.candidates().iter().find_map(|candidate| {
        let candidate = fold(candidate);
        names
            .iter()
            .find(|(name, _)| *name == candidate)
            .map(|(_, value)| *value)
    })
}
