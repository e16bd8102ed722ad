//! Built-in retrieve permissions
//!
//! GeoJSON objects are attributed to a site and a category. Every
//! (category, site) pair gets its own permission; a further permission
//! guards objects whose site or category is not recognised at all.
//! QuakeML events are hidden unless they are public.

use crate::config::DocumentsConfig;
use crate::documents::plugins::PermissionFilter;
use crate::documents::types::{IndexQuery, IndexValue, Predicate};

/// Fields the built-in permissions filter on
pub const SITE_FIELD: &str = "site";
pub const CATEGORY_FIELD: &str = "category";
pub const MAGNITUDE_FIELD: &str = "magnitude";
pub const PUBLIC_FIELD: &str = "public";

#[derive(Debug, Clone, PartialEq)]
pub enum RetrievePermission {
    /// Objects of one category at one site. With a threshold only small
    /// events (below it, or without a magnitude) are hidden.
    CategorySite {
        category: String,
        site: String,
        magnitude_threshold: Option<f64>,
    },
    /// Objects outside the known sites or categories
    UnrecognizedObjects {
        sites: Vec<String>,
        categories: Vec<String>,
    },
    /// Events not flagged public; a missing flag counts as private
    PrivateEvents,
}

impl PermissionFilter for RetrievePermission {
    fn codename(&self) -> String {
        match self {
            RetrievePermission::CategorySite { category, site, .. } => {
                format!("can_see_geojson_category_{}_at_site_{}", category, site).replace('.', "_")
            }
            RetrievePermission::UnrecognizedObjects { .. } => {
                "can_see_geojson_unrecognized_objects".to_string()
            }
            RetrievePermission::PrivateEvents => "can_see_private_events".to_string(),
        }
    }

    fn name(&self) -> String {
        match self {
            RetrievePermission::CategorySite { category, site, .. } => {
                format!("Can See GeoJSON category {} at site {}", category, site)
            }
            RetrievePermission::UnrecognizedObjects { .. } => {
                "Can See GeoJSON Unrecognized objects".to_string()
            }
            RetrievePermission::PrivateEvents => "Can See Private Events".to_string(),
        }
    }

    fn filter_when_unauthorized(&self, query: IndexQuery) -> IndexQuery {
        match self {
            RetrievePermission::CategorySite {
                category,
                site,
                magnitude_threshold,
            } => {
                let mut hidden = vec![
                    Predicate::Equals(SITE_FIELD.to_string(), IndexValue::from(site.as_str())),
                    Predicate::Equals(CATEGORY_FIELD.to_string(), IndexValue::from(category.as_str())),
                ];
                if let Some(threshold) = magnitude_threshold {
                    hidden.push(Predicate::Below(MAGNITUDE_FIELD.to_string(), *threshold));
                }
                query.exclude(hidden)
            }
            RetrievePermission::UnrecognizedObjects { sites, categories } => query
                .require(Predicate::OneOf(
                    SITE_FIELD.to_string(),
                    sites.iter().map(|s| IndexValue::from(s.as_str())).collect(),
                ))
                .require(Predicate::OneOf(
                    CATEGORY_FIELD.to_string(),
                    categories.iter().map(|c| IndexValue::from(c.as_str())).collect(),
                )),
            RetrievePermission::PrivateEvents => query.require(Predicate::Equals(
                PUBLIC_FIELD.to_string(),
                IndexValue::Boolean(true),
            )),
        }
    }
}

/// One permission per (category, site) pair, categories outermost, then
/// the unrecognised-objects permission
pub fn geojson_permissions(config: &DocumentsConfig) -> Vec<RetrievePermission> {
    let mut permissions: Vec<RetrievePermission> = config
        .categories
        .iter()
        .flat_map(|category| {
            config.sites.iter().map(move |site| RetrievePermission::CategorySite {
                category: category.clone(),
                site: site.clone(),
                magnitude_threshold: config.magnitude_threshold,
            })
        })
        .collect();

    permissions.push(RetrievePermission::UnrecognizedObjects {
        sites: config.sites.clone(),
        categories: config.categories.clone(),
    });
    permissions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::types::IndexRecord;

    fn object(site: &str, category: &str, magnitude: Option<f64>) -> IndexRecord {
        let mut record = IndexRecord::new();
        record.insert(SITE_FIELD.into(), site.into());
        record.insert(CATEGORY_FIELD.into(), category.into());
        if let Some(m) = magnitude {
            record.insert(MAGNITUDE_FIELD.into(), m.into());
        }
        record
    }

    fn category_site(threshold: Option<f64>) -> RetrievePermission {
        RetrievePermission::CategorySite {
            category: "Stoerung".into(),
            site: "St.Gallen".into(),
            magnitude_threshold: threshold,
        }
    }

    #[test]
    fn test_codenames() {
        let permission = category_site(None);
        assert_eq!(
            permission.codename(),
            "can_see_geojson_category_Stoerung_at_site_St_Gallen"
        );
        assert_eq!(permission.name(), "Can See GeoJSON category Stoerung at site St.Gallen");
    }

    #[test]
    fn test_category_site_filter() {
        let permission = category_site(None);
        let records = vec![
            object("St.Gallen", "Stoerung", None),
            object("St.Gallen", "Bohrpfad", None),
            object("Poing", "Stoerung", None),
        ];

        let unauthorized = permission.filter_when_unauthorized(IndexQuery::all());
        assert_eq!(unauthorized.apply(&records).len(), 2);

        let authorized = permission.filter_when_authorized(IndexQuery::all());
        assert_eq!(authorized.apply(&records).len(), 3);
    }

    #[test]
    fn test_magnitude_threshold_hides_small_events_only() {
        let permission = category_site(Some(2.0));
        let query = permission.filter_when_unauthorized(IndexQuery::all());

        assert!(!query.matches(&object("St.Gallen", "Stoerung", Some(1.2))));
        assert!(!query.matches(&object("St.Gallen", "Stoerung", None)));
        assert!(query.matches(&object("St.Gallen", "Stoerung", Some(3.1))));
    }

    #[test]
    fn test_unrecognized_objects() {
        let config = DocumentsConfig::default();
        let permissions = geojson_permissions(&config);
        let unrecognized = permissions.last().unwrap();
        let query = unrecognized.filter_when_unauthorized(IndexQuery::all());

        assert!(query.matches(&object("Garching", "Bohrpfad", None)));
        assert!(!query.matches(&object("Garchng", "Bohrpfad", None)));
        assert!(!query.matches(&object("Garching", "Unknown", None)));
        assert!(!query.matches(&IndexRecord::new()));
    }

    #[test]
    fn test_geojson_permission_table() {
        let config = DocumentsConfig {
            sites: vec!["A".into(), "B".into()],
            categories: vec!["X".into(), "Y".into(), "Z".into()],
            magnitude_threshold: None,
        };
        let permissions = geojson_permissions(&config);
        assert_eq!(permissions.len(), 7);
        assert_eq!(permissions[0].codename(), "can_see_geojson_category_X_at_site_A");
        assert_eq!(permissions[1].codename(), "can_see_geojson_category_X_at_site_B");
    }

    #[test]
    fn test_private_events() {
        let query = RetrievePermission::PrivateEvents.filter_when_unauthorized(IndexQuery::all());
        let mut public = IndexRecord::new();
        public.insert(PUBLIC_FIELD.into(), true.into());
        let mut unknown = IndexRecord::new();
        unknown.insert(PUBLIC_FIELD.into(), IndexValue::Null);

        assert!(query.matches(&public));
        assert!(!query.matches(&unknown));
    }
}
