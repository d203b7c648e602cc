//! Catalog reconciliation: plan the diff, then apply it.
//!
//! Matching is by trimmed, lower-cased display name. Uploads carry no
//! durable key, so a renamed medicine shows up as a new entry.

use std::collections::HashMap;

use crate::db::{CatalogStore, DbResult};
use crate::models::{ImportSummary, Medicine, MedicinePayload};

/// A single planned write for one incoming name.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedUpsert {
    /// No catalog entry has this name
    Create(MedicinePayload),
    /// Overwrite the payload's fields on an existing entry
    Update {
        existing: Medicine,
        payload: MedicinePayload,
    },
}

/// The diff between an import batch and the current catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportPlan {
    pub replace_all: bool,
    /// Incoming rows before filtering
    pub total: u64,
    /// Rows without a name
    pub skipped: u64,
    /// Rows superseded by a later row with the same name
    pub duplicates: u64,
    /// One entry per distinct incoming name, in first-seen order
    pub upserts: Vec<PlannedUpsert>,
    /// Catalog entries absent from the batch (replace only), by id
    pub delete_candidates: Vec<Medicine>,
}

impl ImportPlan {
    /// Entries the plan would create.
    pub fn create_count(&self) -> u64 {
        self.upserts
            .iter()
            .filter(|u| matches!(u, PlannedUpsert::Create(_)))
            .count() as u64
    }

    /// Entries the plan would update.
    pub fn update_count(&self) -> u64 {
        self.upserts.len() as u64 - self.create_count()
    }

    fn summary(&self) -> ImportSummary {
        ImportSummary {
            created: self.create_count(),
            updated: self.update_count(),
            skipped: self.skipped,
            duplicates: self.duplicates,
            total: self.total,
            replaced_all: self.replace_all,
            ..Default::default()
        }
    }
}

/// Build a plan from the catalog and an incoming batch. Pure; no I/O.
pub fn plan_import(
    existing: Vec<Medicine>,
    rows: &[MedicinePayload],
    replace_all: bool,
) -> ImportPlan {
    let mut skipped = 0;
    let mut duplicates = 0;

    // Later rows overwrite earlier ones but keep the first-seen position
    let mut incoming: Vec<(String, &MedicinePayload)> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();
    for payload in rows {
        let key = payload.match_key();
        if key.is_empty() {
            skipped += 1;
            continue;
        }
        match position.get(&key) {
            Some(&idx) => {
                incoming[idx].1 = payload;
                duplicates += 1;
            }
            None => {
                position.insert(key.clone(), incoming.len());
                incoming.push((key, payload));
            }
        }
    }

    // Catalog is id-ordered, so for duplicate names the newest entry wins
    let mut existing_by_name: HashMap<String, Medicine> = HashMap::new();
    for medicine in existing {
        existing_by_name.insert(medicine.match_key(), medicine);
    }

    let mut delete_candidates = Vec::new();
    if replace_all {
        delete_candidates = existing_by_name
            .iter()
            .filter(|(name, _)| !position.contains_key(*name))
            .map(|(_, medicine)| medicine.clone())
            .collect::<Vec<_>>();
        delete_candidates.sort_by_key(|m| m.id);
    }

    let upserts = incoming
        .into_iter()
        .map(|(key, payload)| match existing_by_name.remove(&key) {
            Some(existing) => PlannedUpsert::Update {
                existing,
                payload: payload.clone(),
            },
            None => PlannedUpsert::Create(payload.clone()),
        })
        .collect();

    ImportPlan {
        replace_all,
        total: rows.len() as u64,
        skipped,
        duplicates,
        upserts,
        delete_candidates,
    }
}

/// Reconciler bound to a catalog store.
pub struct Reconciler<'a, S: CatalogStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: CatalogStore + ?Sized> Reconciler<'a, S> {
    /// Create a reconciler over a store (usually an open transaction).
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Load the catalog and diff it against `rows`.
    pub fn plan(&self, rows: &[MedicinePayload], replace_all: bool) -> DbResult<ImportPlan> {
        let existing = self.store.load_catalog()?;
        let plan = plan_import(existing, rows, replace_all);
        tracing::debug!(
            total = plan.total,
            creates = plan.create_count(),
            updates = plan.update_count(),
            delete_candidates = plan.delete_candidates.len(),
            "Import planned"
        );
        Ok(plan)
    }

    /// Summary the plan would produce, without writing anything.
    pub fn dry_run(&self, rows: &[MedicinePayload], replace_all: bool) -> DbResult<ImportSummary> {
        let plan = self.plan(rows, replace_all)?;
        let mut summary = plan.summary();

        let ids: Vec<i64> = plan.delete_candidates.iter().map(|m| m.id).collect();
        if !ids.is_empty() {
            let referenced = self.store.referenced_medicine_ids(&ids)?;
            summary.kept_due_to_history = referenced.len() as u64;
            summary.deleted = (ids.len() - referenced.len()) as u64;
        }
        Ok(summary)
    }

    /// Apply a plan. The caller owns the transaction: on error nothing
    /// here must be committed.
    pub fn apply(&self, plan: ImportPlan) -> DbResult<ImportSummary> {
        let mut summary = plan.summary();

        // Deletion phase (replace only): never remove rows sales point at
        if !plan.delete_candidates.is_empty() {
            let ids: Vec<i64> = plan.delete_candidates.iter().map(|m| m.id).collect();
            let referenced = self.store.referenced_medicine_ids(&ids)?;

            for medicine in &plan.delete_candidates {
                if referenced.contains(&medicine.id) {
                    tracing::debug!(id = medicine.id, name = %medicine.name, "Kept due to history");
                    summary.kept_due_to_history += 1;
                } else {
                    self.store.delete_medicine(medicine.id)?;
                    summary.deleted += 1;
                }
            }
        }

        // Upsert phase
        for upsert in plan.upserts {
            match upsert {
                PlannedUpsert::Update {
                    mut existing,
                    payload,
                } => {
                    existing.apply_payload(&payload);
                    existing.touch();
                    self.store.update_medicine(&existing)?;
                }
                PlannedUpsert::Create(payload) => {
                    self.store.insert_medicine(&Medicine::from_payload(&payload))?;
                }
            }
        }

        Ok(summary)
    }

    /// Plan and apply in one step.
    pub fn reconcile(&self, rows: &[MedicinePayload], replace_all: bool) -> DbResult<ImportSummary> {
        let plan = self.plan(rows, replace_all)?;
        self.apply(plan)
    }
}
