//! In-memory model of services and environments.
//!
//! [`Model`] owns every record of a run together with the do-not-merge
//! registry that decides how names are keyed. Each phase takes the model by
//! mutable reference; nothing is global, so several models can coexist in
//! one process.
//!
//! Records are created lazily on first lookup and never removed: a folded
//! duplicate stays in the map as a tombstone.
//!
//! All lookups are O(1) via the internal `HashMap`s. Iteration helpers return
//! records sorted by key so that runs are reproducible.

use std::collections::HashMap;

use regex::Regex;
use tracing::error;

use crate::error::ModelError;
use crate::{CrnMask, DoNotMergeConflict, DoNotMergeRegistry, EnvironmentRecord, ServiceRecord};

/// Services and environments of one run.
///
/// # Examples
///
/// ```
/// use catalog_merge_core::Model;
///
/// let mut model = Model::new();
/// let key = model.comparable_name("IBM Some Service");
/// let (_, existed) = model.lookup_service(&key, true).unwrap();
/// assert!(!existed);
/// let (record, existed) = model.lookup_service(&key, true).unwrap();
/// assert!(existed);
/// assert_eq!(record.comparable_name, "someservice");
/// ```
#[derive(Debug, Default)]
pub struct Model {
    services: HashMap<String, ServiceRecord>,
    environments: HashMap<CrnMask, EnvironmentRecord>,
    environments_by_legacy_mccp_id: HashMap<String, Vec<CrnMask>>,
    environments_by_catalog_id: HashMap<String, CrnMask>,
    do_not_merge: DoNotMergeRegistry,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn do_not_merge(&self) -> &DoNotMergeRegistry {
        &self.do_not_merge
    }

    /// Registers exempt names before any record is keyed by them.
    pub fn register_do_not_merge<'a>(
        &mut self,
        owner: &str,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Vec<DoNotMergeConflict> {
        self.do_not_merge.register_names(owner, names)
    }

    /// Registry-aware comparable name, the key into the service map.
    pub fn comparable_name(&self, raw: &str) -> String {
        self.do_not_merge.make_comparable_name(raw)
    }

    /// Registry-aware canonical name.
    pub fn canonical_name(&self, raw: &str) -> String {
        self.do_not_merge.make_canonical_name(raw)
    }

    // ---------------------------------------------------------------------
    // Services
    // ---------------------------------------------------------------------

    /// Looks up a service by comparable name, creating it on a miss when
    /// `create_if_needed` is set.
    ///
    /// Returns the record and whether it existed before the call.
    pub fn lookup_service(
        &mut self,
        comparable: &str,
        create_if_needed: bool,
    ) -> Option<(&mut ServiceRecord, bool)> {
        if self.services.contains_key(comparable) {
            return self.services.get_mut(comparable).map(|record| (record, true));
        }
        if !create_if_needed {
            return None;
        }
        Some((self.service_or_insert(comparable), false))
    }

    /// Returns the record keyed by `comparable`, creating it if missing.
    pub fn service_or_insert(&mut self, comparable: &str) -> &mut ServiceRecord {
        self.services
            .entry(comparable.to_string())
            .or_insert_with(|| ServiceRecord::new(comparable))
    }

    pub fn service(&self, comparable: &str) -> Option<&ServiceRecord> {
        self.services.get(comparable)
    }

    pub fn service_mut(&mut self, comparable: &str) -> Option<&mut ServiceRecord> {
        self.services.get_mut(comparable)
    }

    /// Removes a record so it can be edited alongside another one.
    ///
    /// Callers must hand it back with [`restore_service`](Self::restore_service).
    pub(crate) fn take_service(&mut self, comparable: &str) -> Option<ServiceRecord> {
        self.services.remove(comparable)
    }

    pub(crate) fn restore_service(&mut self, record: ServiceRecord) {
        self.services.insert(record.comparable_name.clone(), record);
    }

    /// Service keys in sorted order.
    pub fn service_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.services.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Iterates over services whose display name matches `pattern`, or over
    /// all services when no pattern is given, in key order.
    pub fn list_all_services<'a>(
        &'a self,
        pattern: Option<&'a Regex>,
    ) -> impl Iterator<Item = &'a ServiceRecord> + 'a {
        let mut records: Vec<&ServiceRecord> = self.services.values().collect();
        records.sort_unstable_by(|a, b| a.comparable_name.cmp(&b.comparable_name));
        records
            .into_iter()
            .filter(move |record| pattern.is_none_or(|re| re.is_match(&record.display_name)))
    }

    pub fn services_len(&self) -> usize {
        self.services.len()
    }

    // ---------------------------------------------------------------------
    // Environments
    // ---------------------------------------------------------------------

    /// Looks up an environment by CRN mask, keyed by the mask's comparable
    /// form, creating it on a miss when `create_if_needed` is set.
    pub fn lookup_environment(
        &mut self,
        mask: &CrnMask,
        create_if_needed: bool,
    ) -> Option<(&mut EnvironmentRecord, bool)> {
        let key = mask.comparable();
        if self.environments.contains_key(&key) {
            return self.environments.get_mut(&key).map(|record| (record, true));
        }
        if !create_if_needed {
            return None;
        }
        Some((self.environment_or_insert(mask), false))
    }

    /// Returns the environment keyed by the comparable form of `mask`,
    /// creating it if missing.
    pub fn environment_or_insert(&mut self, mask: &CrnMask) -> &mut EnvironmentRecord {
        let key = mask.comparable();
        self.environments
            .entry(key.clone())
            .or_insert_with(|| EnvironmentRecord::new(key))
    }

    pub fn environment(&self, mask: &CrnMask) -> Option<&EnvironmentRecord> {
        self.environments.get(&mask.comparable())
    }

    pub fn environment_mut(&mut self, mask: &CrnMask) -> Option<&mut EnvironmentRecord> {
        self.environments.get_mut(&mask.comparable())
    }

    /// Comparable environment keys in sorted order.
    pub fn environment_keys(&self) -> Vec<CrnMask> {
        let mut keys: Vec<CrnMask> = self.environments.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    pub fn list_all_environments(&self) -> impl Iterator<Item = &EnvironmentRecord> {
        let mut records: Vec<&EnvironmentRecord> = self.environments.values().collect();
        records.sort_unstable_by(|a, b| a.comparable_crn_mask.cmp(&b.comparable_crn_mask));
        records.into_iter()
    }

    pub fn environments_len(&self) -> usize {
        self.environments.len()
    }

    /// Records that the environment keyed by `mask` uses a legacy MCCP id.
    ///
    /// Several environments may share an id; collisions are reported by
    /// environment validation, not here.
    pub fn register_legacy_mccp_id(&mut self, id: &str, mask: &CrnMask) {
        let key = mask.comparable();
        let entries = self
            .environments_by_legacy_mccp_id
            .entry(id.to_string())
            .or_default();
        if !entries.contains(&key) {
            entries.push(key);
        }
    }

    pub fn environments_by_legacy_mccp_id(&self, id: &str) -> &[CrnMask] {
        self.environments_by_legacy_mccp_id
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Legacy MCCP ids in sorted order, with the environments using each.
    pub fn legacy_mccp_ids(&self) -> Vec<(&str, &[CrnMask])> {
        let mut ids: Vec<(&str, &[CrnMask])> = self
            .environments_by_legacy_mccp_id
            .iter()
            .map(|(id, masks)| (id.as_str(), masks.as_slice()))
            .collect();
        ids.sort_unstable_by(|a, b| a.0.cmp(b.0));
        ids
    }

    /// Maps a catalog resource id to the environment keyed by `mask`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateCatalogId`] if the id already maps to a
    /// different environment. The existing mapping is kept.
    pub fn register_catalog_id(&mut self, id: &str, mask: &CrnMask) -> Result<(), ModelError> {
        let key = mask.comparable();
        match self.environments_by_catalog_id.get(id) {
            Some(existing) if *existing == key => Ok(()),
            Some(existing) => {
                let err = ModelError::DuplicateCatalogId {
                    id: id.to_string(),
                    existing: existing.to_string(),
                };
                error!(%err, "duplicate catalog resource id");
                Err(err)
            }
            None => {
                self.environments_by_catalog_id.insert(id.to_string(), key);
                Ok(())
            }
        }
    }

    pub fn environment_by_catalog_id(&self, id: &str) -> Option<&EnvironmentRecord> {
        self.environments_by_catalog_id
            .get(id)
            .and_then(|key| self.environments.get(key))
    }

    /// Clears per-run scratch state on every record.
    pub fn reset_work_areas(&mut self) {
        for record in self.services.values_mut() {
            record.work_area = Default::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(raw: &str) -> CrnMask {
        CrnMask::parse(raw).unwrap()
    }

    #[test]
    fn test_lookup_service_creates_lazily() {
        let mut model = Model::new();
        assert!(model.lookup_service("foo", false).is_none());

        let (record, existed) = model.lookup_service("foo", true).unwrap();
        assert!(!existed);
        assert_eq!(record.comparable_name, "foo");
        assert!(record.validation.is_empty());

        let (_, existed) = model.lookup_service("foo", false).unwrap();
        assert!(existed);
        assert_eq!(model.services_len(), 1);
    }

    #[test]
    fn test_comparable_name_honors_registry() {
        let mut model = Model::new();
        assert_eq!(model.comparable_name("IBM Foo"), "foo");
        model.register_do_not_merge("config", ["IBM Foo"]);
        assert_eq!(model.comparable_name("IBM Foo"), "IBM Foo");
        assert_eq!(model.canonical_name("IBM Foo"), "IBM Foo");
    }

    #[test]
    fn test_list_all_services_filters_by_display_name() {
        let mut model = Model::new();
        for (key, display) in [("b", "Beta Service"), ("a", "Alpha Service"), ("c", "Gamma")] {
            let (record, _) = model.lookup_service(key, true).unwrap();
            record.display_name = display.to_string();
        }

        let all: Vec<&str> = model
            .list_all_services(None)
            .map(|r| r.comparable_name.as_str())
            .collect();
        assert_eq!(all, vec!["a", "b", "c"]);

        let re = Regex::new("Service$").unwrap();
        let matched: Vec<&str> = model
            .list_all_services(Some(&re))
            .map(|r| r.comparable_name.as_str())
            .collect();
        assert_eq!(matched, vec!["a", "b"]);
    }

    #[test]
    fn test_environment_lookup_uses_comparable_mask() {
        let mut model = Model::new();
        let (_, existed) = model
            .lookup_environment(&mask("crn:v1:l-acme:local::us-south::::"), true)
            .unwrap();
        assert!(!existed);
        let (_, existed) = model
            .lookup_environment(&mask("crn:v1:acme:local::eu-de::::"), true)
            .unwrap();
        assert!(existed);
        assert_eq!(model.environments_len(), 1);
    }

    #[test]
    fn test_legacy_mccp_index_keeps_collisions() {
        let mut model = Model::new();
        let a = mask("crn:v1:bluemix:public::us-south::::");
        let b = mask("crn:v1:bluemix:public::eu-de::::");
        model.register_legacy_mccp_id("1", &a);
        model.register_legacy_mccp_id("1", &b);
        model.register_legacy_mccp_id("1", &a);

        assert_eq!(model.environments_by_legacy_mccp_id("1").len(), 2);
        assert!(model.environments_by_legacy_mccp_id("2").is_empty());
    }

    #[test]
    fn test_catalog_id_duplicate_does_not_overwrite() {
        let mut model = Model::new();
        let a = mask("crn:v1:bluemix:public::us-south::::");
        let b = mask("crn:v1:bluemix:public::eu-de::::");
        model.lookup_environment(&a, true);
        model.register_catalog_id("id-1", &a).unwrap();
        model.register_catalog_id("id-1", &a).unwrap();

        let err = model.register_catalog_id("id-1", &b).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateCatalogId { .. }));
        assert_eq!(
            model
                .environment_by_catalog_id("id-1")
                .map(|e| e.comparable_crn_mask.location.as_str()),
            Some("us-south")
        );
    }

    #[test]
    fn test_reset_work_areas() {
        let mut model = Model::new();
        let (record, _) = model.lookup_service("foo", true).unwrap();
        record.work_area.composite_parent = Some("is".into());
        model.reset_work_areas();
        assert_eq!(model.service("foo").unwrap().work_area.composite_parent, None);
    }
}
