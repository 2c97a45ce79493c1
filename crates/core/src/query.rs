//! Validated shape of a file listing query.
//!
//! Raw query parameters are parsed into [`ListQuery`] before any SQL is
//! composed. Sorting is expressed as closed enums, so a metadata backend can
//! map every combination to a fixed ORDER BY fragment.

use crate::error::{Error, Result};
use crate::tag::normalize_tags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column a listing is ordered by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Random,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Random => "random",
        }
    }
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "created_at" => Ok(SortField::CreatedAt),
            "updated_at" => Ok(SortField::UpdatedAt),
            "random" => Ok(SortField::Random),
            _ => Err(Error::InvalidSortField(s.to_string())),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(SortOrder::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(SortOrder::Desc)
        } else {
            Err(Error::InvalidSortOrder(s.to_string()))
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw, unvalidated listing parameters as they arrive on the query string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListParams {
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub tags: Vec<String>,
}

impl ListParams {
    /// Collect parameters from decoded query pairs.
    ///
    /// Empty values count as unset. For the scalar parameters the first
    /// non-empty occurrence wins; every `tag` occurrence is kept. Unknown
    /// parameters are ignored.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = ListParams::default();
        for (key, value) in pairs {
            let value = value.as_ref();
            if value.is_empty() {
                continue;
            }
            let slot = match key.as_ref() {
                "limit" => &mut params.limit,
                "sort_by" => &mut params.sort_by,
                "order" => &mut params.order,
                "tag" => {
                    params.tags.push(value.to_string());
                    continue;
                }
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.to_string());
            }
        }
        params
    }
}

/// A validated listing query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListQuery {
    pub limit: u32,
    pub sort_by: SortField,
    pub order: SortOrder,
    /// Required tags; a row matches when its tag set contains all of them.
    pub tags: Vec<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: crate::DEFAULT_LIST_LIMIT,
            sort_by: SortField::default(),
            order: SortOrder::default(),
            tags: Vec::new(),
        }
    }
}

impl ListQuery {
    /// Validate raw parameters. `max_limit` is the configured ceiling.
    pub fn from_params(params: &ListParams, max_limit: u32) -> Result<Self> {
        let limit = match params.limit.as_deref() {
            None => crate::DEFAULT_LIST_LIMIT.min(max_limit),
            Some(raw) => parse_limit(raw, max_limit)?,
        };
        let sort_by = match params.sort_by.as_deref() {
            None => SortField::default(),
            Some(raw) => raw.parse()?,
        };
        let order = match params.order.as_deref() {
            None => SortOrder::default(),
            Some(raw) => raw.parse()?,
        };
        let tags = normalize_tags(params.tags.iter().map(String::as_str))?;

        Ok(Self {
            limit,
            sort_by,
            order,
            tags,
        })
    }
}

fn parse_limit(raw: &str, max_limit: u32) -> Result<u32> {
    let limit: i64 = raw
        .parse()
        .map_err(|_| Error::InvalidLimit(format!("not an integer: {raw}")))?;
    if limit < 1 || limit > i64::from(max_limit) {
        return Err(Error::InvalidLimit(format!(
            "{limit} is outside 1..={max_limit}"
        )));
    }
    // In range of u32 after the check above.
    Ok(limit as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> Result<ListQuery> {
        ListQuery::from_params(&ListParams::from_pairs(pairs.iter().copied()), 100)
    }

    #[test]
    fn test_defaults() {
        let q = query(&[]).unwrap();
        assert_eq!(q, ListQuery::default());
        assert_eq!(q.limit, 10);
        assert_eq!(q.sort_by, SortField::CreatedAt);
        assert_eq!(q.order, SortOrder::Desc);
    }

    #[test]
    fn test_empty_values_are_unset() {
        let q = query(&[("limit", ""), ("sort_by", ""), ("order", "")]).unwrap();
        assert_eq!(q, ListQuery::default());
    }

    #[test]
    fn test_case_insensitive_values() {
        let q = query(&[("sort_by", "UPDATED_AT"), ("order", "asc")]).unwrap();
        assert_eq!(q.sort_by, SortField::UpdatedAt);
        assert_eq!(q.order, SortOrder::Asc);

        let q = query(&[("sort_by", "Random")]).unwrap();
        assert_eq!(q.sort_by, SortField::Random);
    }

    #[test]
    fn test_limit_bounds() {
        assert_eq!(query(&[("limit", "1")]).unwrap().limit, 1);
        assert_eq!(query(&[("limit", "100")]).unwrap().limit, 100);
        assert!(matches!(
            query(&[("limit", "0")]),
            Err(Error::InvalidLimit(_))
        ));
        assert!(matches!(
            query(&[("limit", "-5")]),
            Err(Error::InvalidLimit(_))
        ));
        assert!(matches!(
            query(&[("limit", "101")]),
            Err(Error::InvalidLimit(_))
        ));
        assert!(matches!(
            query(&[("limit", "ten")]),
            Err(Error::InvalidLimit(_))
        ));
    }

    #[test]
    fn test_configured_ceiling() {
        let params = ListParams::from_pairs([("limit", "50")]);
        assert!(ListQuery::from_params(&params, 20).is_err());
        assert_eq!(
            ListQuery::from_params(&ListParams::default(), 5)
                .unwrap()
                .limit,
            5
        );
    }

    #[test]
    fn test_rejects_injection_attempts() {
        assert!(matches!(
            query(&[("sort_by", "DROP TABLE files")]),
            Err(Error::InvalidSortField(_))
        ));
        assert!(matches!(
            query(&[("sort_by", "created_at; DELETE FROM files")]),
            Err(Error::InvalidSortField(_))
        ));
        assert!(matches!(
            query(&[("order", "DESC, (SELECT 1)")]),
            Err(Error::InvalidSortOrder(_))
        ));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let q = query(&[("order", "asc"), ("order", "desc")]).unwrap();
        assert_eq!(q.order, SortOrder::Asc);
    }

    #[test]
    fn test_tags_collected_and_deduplicated() {
        let q = query(&[("tag", "b"), ("tag", "a"), ("tag", "b"), ("other", "x")]).unwrap();
        assert_eq!(q.tags, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_sort_fragment_names() {
        assert_eq!(SortField::CreatedAt.to_string(), "created_at");
        assert_eq!(SortOrder::Desc.to_string(), "DESC");
    }
}
