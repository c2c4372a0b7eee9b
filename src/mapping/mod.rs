//! Identity and taxonomy resolution with per-run caching.
//!
//! One [`MappingCache`] per run, passed by reference through the single
//! control flow. Target directories and category lists load lazily and are
//! dropped by [`MappingCache::clear`] at the orchestrator's periodic
//! checkpoints, rebuilding on next use.
//!
//! Resolution semantics: a miss is an explicit `None`/fallback, never an
//! error. Only directory loads (user/company) propagate remote failures;
//! taxonomy lookups degrade to unresolved with a warning, because the
//! caller treats those gaps as cosmetic.

pub mod rules;

use std::collections::HashMap;

use crate::error::MigrationError;
use crate::source::SourceClient;
use crate::target::TargetClient;
use crate::types::CategoryItem;
use crate::util::{normalize_email, normalize_key};

/// Resolved target taxonomy for one source activity type name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedActivityType {
    pub activity_type_id: Option<String>,
    pub sub_activity_type_id: Option<String>,
}

/// Target category lists for one company.
#[derive(Debug, Clone, Default)]
struct CompanyCategories {
    activity_types: Vec<CategoryItem>,
    sub_activity_types: Vec<CategoryItem>,
    meeting_subtypes: Vec<CategoryItem>,
}

/// Per-run mapping state. No global singletons: the orchestrator owns one
/// instance and hands it down.
pub struct MappingCache {
    /// System-user id used when an author has no target account.
    fallback_user_id: String,
    directory_page_size: u32,
    user_directory: Option<HashMap<String, String>>,
    company_directory: Option<HashMap<String, String>>,
    users: HashMap<String, String>,
    companies: HashMap<String, Option<String>>,
    activity_types: HashMap<String, ResolvedActivityType>,
    milestones: HashMap<String, Option<String>>,
    categories: HashMap<String, CompanyCategories>,
    source_milestones: HashMap<String, Vec<CategoryItem>>,
    target_milestones: HashMap<String, Vec<CategoryItem>>,
}

impl MappingCache {
    pub fn new(fallback_user_id: String, directory_page_size: u32) -> Self {
        Self {
            fallback_user_id,
            directory_page_size,
            user_directory: None,
            company_directory: None,
            users: HashMap::new(),
            companies: HashMap::new(),
            activity_types: HashMap::new(),
            milestones: HashMap::new(),
            categories: HashMap::new(),
            source_milestones: HashMap::new(),
            target_milestones: HashMap::new(),
        }
    }

    /// Drop every cached mapping and directory. Everything rebuilds lazily
    /// on next use.
    pub fn clear(&mut self) {
        self.user_directory = None;
        self.company_directory = None;
        self.users.clear();
        self.companies.clear();
        self.activity_types.clear();
        self.milestones.clear();
        self.categories.clear();
        self.source_milestones.clear();
        self.target_milestones.clear();
    }

    // -----------------------------------------------------------------------
    // Users and companies
    // -----------------------------------------------------------------------

    /// Target user id for a source email. Falls back to the system user on a
    /// directory miss; the result (either way) is memoized for the run.
    pub async fn resolve_user(
        &mut self,
        target: &TargetClient,
        email: &str,
    ) -> Result<String, MigrationError> {
        let key = normalize_email(email);
        if let Some(id) = self.users.get(&key) {
            return Ok(id.clone());
        }

        self.ensure_user_directory(target).await?;
        let resolved = self
            .user_directory
            .as_ref()
            .and_then(|dir| dir.get(&key))
            .cloned();

        let id = match resolved {
            Some(id) => id,
            None => {
                log::debug!("no target user for {}, attributing to system user", email);
                self.fallback_user_id.clone()
            }
        };
        self.users.insert(key, id.clone());
        Ok(id)
    }

    /// Target company id for a source company name. `None` means the company
    /// does not exist on the target side; there is deliberately no fallback
    /// company, the caller fails the entry.
    pub async fn resolve_company(
        &mut self,
        target: &TargetClient,
        name: &str,
    ) -> Result<Option<String>, MigrationError> {
        let key = normalize_key(name);
        if key.is_empty() {
            return Ok(None);
        }
        if let Some(hit) = self.companies.get(&key) {
            return Ok(hit.clone());
        }

        self.ensure_company_directory(target).await?;
        let resolved = self
            .company_directory
            .as_ref()
            .and_then(|dir| dir.get(&key))
            .cloned();

        self.companies.insert(key, resolved.clone());
        Ok(resolved)
    }

    async fn ensure_user_directory(
        &mut self,
        target: &TargetClient,
    ) -> Result<(), MigrationError> {
        if self.user_directory.is_some() {
            return Ok(());
        }
        let users = target.list_users(self.directory_page_size).await?;
        log::info!("loaded target user directory ({} users)", users.len());
        let directory = users
            .into_iter()
            .filter(|u| !u.email.is_empty())
            .map(|u| (normalize_email(&u.email), u.id))
            .collect();
        self.user_directory = Some(directory);
        Ok(())
    }

    async fn ensure_company_directory(
        &mut self,
        target: &TargetClient,
    ) -> Result<(), MigrationError> {
        if self.company_directory.is_some() {
            return Ok(());
        }
        let companies = target.list_companies(self.directory_page_size).await?;
        log::info!(
            "loaded target company directory ({} companies)",
            companies.len()
        );
        let directory = companies
            .into_iter()
            .filter(|c| !c.name.is_empty())
            .map(|c| (normalize_key(&c.name), c.id))
            .collect();
        self.company_directory = Some(directory);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Activity types
    // -----------------------------------------------------------------------

    /// Resolve a source activity type name against the static rule table and
    /// the target's live category lists. Unresolved types come back with
    /// both ids `None`; the entry proceeds untyped.
    pub async fn resolve_activity_type(
        &mut self,
        target: &TargetClient,
        source_name: &str,
        company_id: &str,
    ) -> ResolvedActivityType {
        let cache_key = normalize_key(source_name);
        if let Some(hit) = self.activity_types.get(&cache_key) {
            return hit.clone();
        }

        let resolved = match rules::canonical_activity_type(source_name) {
            None => {
                if !source_name.is_empty() {
                    log::debug!("no canonical mapping for activity type '{}'", source_name);
                }
                ResolvedActivityType::default()
            }
            Some((canonical_type, canonical_subtype)) => {
                match self.company_categories(target, company_id).await {
                    Err(e) => {
                        log::warn!("category lookup for company {} failed: {}", company_id, e);
                        ResolvedActivityType::default()
                    }
                    Ok(categories) => {
                        let activity_type_id =
                            find_category(&categories.activity_types, canonical_type);
                        // Meetings use their own subtype list
                        let sub_activity_type_id = if canonical_type == "Meeting" {
                            find_category(&categories.meeting_subtypes, canonical_subtype)
                        } else {
                            find_category(&categories.sub_activity_types, canonical_subtype)
                        };
                        ResolvedActivityType {
                            activity_type_id,
                            sub_activity_type_id,
                        }
                    }
                }
            }
        };

        self.activity_types.insert(cache_key, resolved.clone());
        resolved
    }

    async fn company_categories(
        &mut self,
        target: &TargetClient,
        company_id: &str,
    ) -> Result<CompanyCategories, MigrationError> {
        if let Some(hit) = self.categories.get(company_id) {
            return Ok(hit.clone());
        }
        let loaded = CompanyCategories {
            activity_types: target.activity_types(company_id).await?,
            sub_activity_types: target.sub_activity_types(company_id).await?,
            meeting_subtypes: target.meeting_subtypes(company_id).await?,
        };
        self.categories
            .insert(company_id.to_string(), loaded.clone());
        Ok(loaded)
    }

    // -----------------------------------------------------------------------
    // Milestone types
    // -----------------------------------------------------------------------

    /// Resolve a source milestone type id to a target one through the label
    /// chain: source id → source label → (rule table) → target label →
    /// target id. Any gap in the chain yields `None`; the entry proceeds
    /// without milestone enrichment.
    pub async fn resolve_milestone_type(
        &mut self,
        source: &SourceClient,
        target: &TargetClient,
        milestone_id: &str,
        source_company_id: &str,
        target_company_id: &str,
    ) -> Option<String> {
        let cache_key = format!("{}|{}", milestone_id, target_company_id);
        if let Some(hit) = self.milestones.get(&cache_key) {
            return hit.clone();
        }

        let resolved = self
            .lookup_milestone(source, target, milestone_id, source_company_id, target_company_id)
            .await;
        self.milestones.insert(cache_key, resolved.clone());
        resolved
    }

    async fn lookup_milestone(
        &mut self,
        source: &SourceClient,
        target: &TargetClient,
        milestone_id: &str,
        source_company_id: &str,
        target_company_id: &str,
    ) -> Option<String> {
        let source_list = match self.source_milestone_list(source, source_company_id).await {
            Ok(list) => list,
            Err(e) => {
                log::warn!(
                    "source milestone list for company {} failed: {}",
                    source_company_id,
                    e
                );
                return None;
            }
        };
        let source_label = source_list
            .iter()
            .find(|m| m.id == milestone_id)
            .map(|m| m.label.clone())?;

        let target_label = rules::target_milestone_label(&source_label)?;

        let target_list = match self.target_milestone_list(target, target_company_id).await {
            Ok(list) => list,
            Err(e) => {
                log::warn!(
                    "target milestone list for company {} failed: {}",
                    target_company_id,
                    e
                );
                return None;
            }
        };
        find_category(&target_list, target_label)
    }

    async fn source_milestone_list(
        &mut self,
        source: &SourceClient,
        company_id: &str,
    ) -> Result<Vec<CategoryItem>, MigrationError> {
        if let Some(hit) = self.source_milestones.get(company_id) {
            return Ok(hit.clone());
        }
        let list = source.milestone_types(company_id).await?;
        self.source_milestones
            .insert(company_id.to_string(), list.clone());
        Ok(list)
    }

    async fn target_milestone_list(
        &mut self,
        target: &TargetClient,
        company_id: &str,
    ) -> Result<Vec<CategoryItem>, MigrationError> {
        if let Some(hit) = self.target_milestones.get(company_id) {
            return Ok(hit.clone());
        }
        let list = target.milestone_types(company_id).await?;
        self.target_milestones
            .insert(company_id.to_string(), list.clone());
        Ok(list)
    }
}

fn find_category(items: &[CategoryItem], canonical: &str) -> Option<String> {
    let key = normalize_key(canonical);
    items
        .iter()
        .find(|item| normalize_key(&item.label) == key)
        .map(|item| item.id.clone())
}

// ---------------------------------------------------------------------------
// Test seeding
// ---------------------------------------------------------------------------

#[cfg(test)]
impl MappingCache {
    pub(crate) fn seed_users(&mut self, entries: &[(&str, &str)]) {
        let dir = entries
            .iter()
            .map(|(email, id)| (normalize_email(email), id.to_string()))
            .collect();
        self.user_directory = Some(dir);
    }

    pub(crate) fn seed_companies(&mut self, entries: &[(&str, &str)]) {
        let dir = entries
            .iter()
            .map(|(name, id)| (normalize_key(name), id.to_string()))
            .collect();
        self.company_directory = Some(dir);
    }

    pub(crate) fn seed_categories(
        &mut self,
        company_id: &str,
        activity_types: &[(&str, &str)],
        sub_activity_types: &[(&str, &str)],
        meeting_subtypes: &[(&str, &str)],
    ) {
        fn items(entries: &[(&str, &str)]) -> Vec<CategoryItem> {
            entries
                .iter()
                .map(|(id, label)| CategoryItem {
                    id: id.to_string(),
                    label: label.to_string(),
                })
                .collect()
        }
        self.categories.insert(
            company_id.to_string(),
            CompanyCategories {
                activity_types: items(activity_types),
                sub_activity_types: items(sub_activity_types),
                meeting_subtypes: items(meeting_subtypes),
            },
        );
    }

    pub(crate) fn seed_milestones(
        &mut self,
        source_company: &str,
        source_list: &[(&str, &str)],
        target_company: &str,
        target_list: &[(&str, &str)],
    ) {
        fn items(entries: &[(&str, &str)]) -> Vec<CategoryItem> {
            entries
                .iter()
                .map(|(id, label)| CategoryItem {
                    id: id.to_string(),
                    label: label.to_string(),
                })
                .collect()
        }
        self.source_milestones
            .insert(source_company.to_string(), items(source_list));
        self.target_milestones
            .insert(target_company.to_string(), items(target_list));
    }
}
