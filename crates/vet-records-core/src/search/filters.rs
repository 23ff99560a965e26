//! Search filters.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{SearchError, SearchResult};

/// Option value meaning "no constraint".
pub const ALL: &str = "all";

/// Recognized filter dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Species,
    Breed,
    Age,
}

impl FilterKind {
    pub const ALL_KINDS: [FilterKind; 3] = [FilterKind::Species, FilterKind::Breed, FilterKind::Age];

    /// Filter name as used in string-keyed selections.
    pub fn key(&self) -> &'static str {
        match self {
            FilterKind::Species => "species",
            FilterKind::Breed => "breed",
            FilterKind::Age => "age",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for FilterKind {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "species" => Ok(FilterKind::Species),
            "breed" => Ok(FilterKind::Breed),
            "age" => Ok(FilterKind::Age),
            other => Err(SearchError::UnknownFilter(other.to_string())),
        }
    }
}

/// Age brackets, in years. Half-open, contiguous, covering `[0, 100)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeBracket {
    Puppy,
    Young,
    Adult,
    Senior,
}

impl AgeBracket {
    pub const ALL: [AgeBracket; 4] = [
        AgeBracket::Puppy,
        AgeBracket::Young,
        AgeBracket::Adult,
        AgeBracket::Senior,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            AgeBracket::Puppy => "puppy",
            AgeBracket::Young => "young",
            AgeBracket::Adult => "adult",
            AgeBracket::Senior => "senior",
        }
    }

    /// `[min, max)` in years.
    pub fn range(&self) -> (f64, f64) {
        match self {
            AgeBracket::Puppy => (0.0, 1.0),
            AgeBracket::Young => (1.0, 3.0),
            AgeBracket::Adult => (3.0, 8.0),
            AgeBracket::Senior => (8.0, 100.0),
        }
    }

    pub fn contains(&self, age: f64) -> bool {
        let (min, max) = self.range();
        age >= min && age < max
    }

    /// The bracket containing `age`, if it is within `[0, 100)`.
    pub fn for_age(age: f64) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.contains(age))
    }

    /// Display label in the clinic locale.
    pub fn label(&self) -> &'static str {
        match self {
            AgeBracket::Puppy => "Filhote (0-1 ano)",
            AgeBracket::Young => "Jovem (1-3 anos)",
            AgeBracket::Adult => "Adulto (3-8 anos)",
            AgeBracket::Senior => "Idoso (8+ anos)",
        }
    }
}

impl FromStr for AgeBracket {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.key() == s)
            .ok_or_else(|| SearchError::InvalidFilterValue {
                filter: FilterKind::Age.key(),
                value: s.to_string(),
            })
    }
}

/// A parsed change to one filter. `None` clears the constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterUpdate {
    Species(Option<String>),
    Breed(Option<String>),
    Age(Option<AgeBracket>),
}

impl FilterUpdate {
    /// Parse a selection; `"all"` and the empty string clear the filter.
    pub fn parse(kind: FilterKind, value: &str) -> SearchResult<Self> {
        let value = value.trim();
        let selected = (!value.is_empty() && value != ALL).then(|| value.to_string());
        Ok(match kind {
            FilterKind::Species => FilterUpdate::Species(selected),
            FilterKind::Breed => FilterUpdate::Breed(selected),
            FilterKind::Age => FilterUpdate::Age(selected.map(|v| v.parse()).transpose()?),
        })
    }
}

/// Current filter selections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    /// Exact species option value
    pub species: Option<String>,
    /// Case-insensitive breed substring
    pub breed: Option<String>,
    pub age: Option<AgeBracket>,
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a string-keyed selection map.
    pub fn from_map(selections: &HashMap<String, String>) -> SearchResult<Self> {
        let mut filters = Self::default();
        for (name, value) in selections {
            filters.set(name.parse()?, value)?;
        }
        Ok(filters)
    }

    pub fn set(&mut self, kind: FilterKind, value: &str) -> SearchResult<()> {
        self.apply(FilterUpdate::parse(kind, value)?);
        Ok(())
    }

    pub fn with(mut self, kind: FilterKind, value: &str) -> SearchResult<Self> {
        self.set(kind, value)?;
        Ok(self)
    }

    pub fn apply(&mut self, update: FilterUpdate) {
        match update {
            FilterUpdate::Species(value) => self.species = value,
            FilterUpdate::Breed(value) => self.breed = value,
            FilterUpdate::Age(value) => self.age = value,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Selected option value, or `"all"`.
    pub fn selection(&self, kind: FilterKind) -> &str {
        match kind {
            FilterKind::Species => self.species.as_deref().unwrap_or(ALL),
            FilterKind::Breed => self.breed.as_deref().unwrap_or(ALL),
            FilterKind::Age => self.age.map(|a| a.key()).unwrap_or(ALL),
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.species.is_none() && self.breed.is_none() && self.age.is_none()
    }
}

/// A selectable option of a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// A filter as presented by the search bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDefinition {
    pub kind: FilterKind,
    pub label: &'static str,
    pub options: Vec<FilterOption>,
}

/// Label of the "no constraint" option.
pub const ALL_LABEL: &str = "Todos";

/// Filters offered by the patient search bar.
pub fn default_filters() -> Vec<FilterDefinition> {
    let option = |value, label| FilterOption { value, label };
    vec![
        FilterDefinition {
            kind: FilterKind::Species,
            label: "Espécie",
            options: vec![
                option("dog", "Cachorro"),
                option("cat", "Gato"),
                option("bird", "Pássaro"),
                option("other", "Outro"),
            ],
        },
        FilterDefinition {
            kind: FilterKind::Breed,
            label: "Raça",
            options: vec![
                option("labrador", "Labrador"),
                option("poodle", "Poodle"),
                option("siamese", "Siamês"),
                option("persian", "Persa"),
            ],
        },
        FilterDefinition {
            kind: FilterKind::Age,
            label: "Idade",
            options: AgeBracket::ALL
                .into_iter()
                .map(|b| option(b.key(), b.label()))
                .collect(),
        },
    ]
}
