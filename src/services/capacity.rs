//! Weekly capacity reconciliation for one room.
//!
//! Flow of a submit:
//! 1. `plan`: diff the grid against the room's persisted slots, cell by cell, into
//!    creates, updates and deletes (empty / non-positive cells without a slot are no-ops).
//! 2. `apply_all`: issue every operation at once, one scoped thread each, and wait for
//!    all of them to settle. Failures are collected, never rolled back.
//! 3. Reload the whole capacity collection. The server is authoritative, so the local
//!    cache is replaced by what it returns rather than by the planned end state.

use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::client::{ApiError, EscalaClient};
use crate::grid::{WeeklyGrid, parse_capacity};
use crate::models::cadastros::{CapacidadeId, CapacidadeSala, DiaSemana, NewCapacidadeSala, SalaId, Turno};
use crate::utils::NoticeSlot;

/// Natural key of a weekly slot within one room, rendered as `"{day}-{shift}"`.
pub type SlotKey = (DiaSemana, Turno);

pub fn slot_key_label((dia, turno): SlotKey) -> String {
    format!("{}-{}", dia, turno)
}

/// Remote collection of capacity records.
pub trait CapacityStore: Sync {
    fn list_capacities(&self) -> Result<Vec<CapacidadeSala>, ApiError>;
    fn create_capacity(&self, new: &NewCapacidadeSala) -> Result<CapacidadeSala, ApiError>;
    fn update_capacity(&self, id: CapacidadeId, slot: &CapacidadeSala) -> Result<CapacidadeSala, ApiError>;
    fn delete_capacity(&self, id: CapacidadeId) -> Result<(), ApiError>;
}

impl CapacityStore for EscalaClient {
    fn list_capacities(&self) -> Result<Vec<CapacidadeSala>, ApiError> {
        self.get_capacidades()
    }

    fn create_capacity(&self, new: &NewCapacidadeSala) -> Result<CapacidadeSala, ApiError> {
        self.create_capacidade(new)
    }

    fn update_capacity(&self, id: CapacidadeId, slot: &CapacidadeSala) -> Result<CapacidadeSala, ApiError> {
        self.update_capacidade(id, slot)
    }

    fn delete_capacity(&self, id: CapacidadeId) -> Result<(), ApiError> {
        self.delete_capacidade(id)
    }
}

/// Weekly slots of `sala`, keyed by (day, shift). Special-date records are skipped.
pub fn index_slots(sala: SalaId, slots: &[CapacidadeSala]) -> BTreeMap<SlotKey, CapacidadeSala> {
    slots
        .iter()
        .filter(|s| s.sala == sala)
        .filter_map(|s| s.dia_semana.map(|dia| ((dia, s.turno), s.clone())))
        .collect()
}

/// Sum of persisted capacities for `sala`.
pub fn saved_total(sala: SalaId, slots: &[CapacidadeSala]) -> u32 {
    slots
        .iter()
        .filter(|s| s.sala == sala)
        .map(|s| s.capacidade)
        .fold(0u32, u32::saturating_add)
}

#[derive(Debug, Clone, PartialEq)]
pub enum CapacityOp {
    Create(NewCapacidadeSala),
    /// `slot` is the existing record with the new capacity; its other fields
    /// (notably `restricoes`) are sent back unchanged.
    Update { id: CapacidadeId, slot: CapacidadeSala },
    Delete { id: CapacidadeId },
}

impl Display for CapacityOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CapacityOp::Create(new) => write!(
                f,
                "create {} = {}",
                slot_key_label((new.dia_semana, new.turno)),
                new.capacidade
            ),
            CapacityOp::Update { id, slot } => write!(f, "update #{} = {}", id.0, slot.capacidade),
            CapacityOp::Delete { id } => write!(f, "delete #{}", id.0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub ops: Vec<CapacityOp>,
    pub noops: usize,
}

impl Plan {
    pub fn creates(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, CapacityOp::Create(_))).count()
    }

    pub fn updates(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, CapacityOp::Update { .. })).count()
    }

    pub fn deletes(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, CapacityOp::Delete { .. })).count()
    }
}

/// Diff all 14 cells of `grid` against the existing slots of `sala`.
pub fn plan(sala: SalaId, grid: &WeeklyGrid, existing: &BTreeMap<SlotKey, CapacidadeSala>) -> Plan {
    let mut out = Plan::default();
    for (dia, turno, raw) in grid.cells() {
        let current = existing.get(&(dia, turno));
        match (parse_capacity(raw), current) {
            (Some(capacidade), Some(slot)) => out.ops.push(CapacityOp::Update {
                id: slot.id,
                slot: CapacidadeSala {
                    capacidade,
                    ..slot.clone()
                },
            }),
            (Some(capacidade), None) => {
                out.ops
                    .push(CapacityOp::Create(NewCapacidadeSala::new(sala, dia, turno, capacidade)))
            }
            (None, Some(slot)) => out.ops.push(CapacityOp::Delete { id: slot.id }),
            (None, None) => out.noops += 1,
        }
    }
    out
}

/// One operation that did not go through.
#[derive(Debug)]
pub struct OpFailure {
    pub op: CapacityOp,
    pub error: ApiError,
}

fn run_op<S: CapacityStore + ?Sized>(store: &S, op: &CapacityOp) -> Result<(), ApiError> {
    match op {
        CapacityOp::Create(new) => store.create_capacity(new).map(|_| ()),
        CapacityOp::Update { id, slot } => store.update_capacity(*id, slot).map(|_| ()),
        CapacityOp::Delete { id } => store.delete_capacity(*id),
    }
}

/// Issue every operation concurrently and wait for all of them to settle.
/// Returns the failures; successful operations stay applied.
pub fn apply_all<S: CapacityStore + ?Sized>(store: &S, ops: &[CapacityOp]) -> Vec<OpFailure> {
    thread::scope(|scope| {
        let handles = ops
            .iter()
            .map(|op| (op, scope.spawn(move || run_op(store, op))))
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .filter_map(|(op, handle)| {
                let error = match handle.join() {
                    Ok(Ok(())) => return None,
                    Ok(Err(e)) => e,
                    Err(_) => ApiError::Transport("capacity worker panicked".to_string()),
                };
                warn!("Capacity {} failed: {}", op, error);
                Some(OpFailure { op: op.clone(), error })
            })
            .collect()
    })
}

#[derive(Debug)]
pub enum ReconcileError {
    /// Submit was called with no room selected; nothing was sent.
    NoRoomSelected,
    /// Some operations failed. The others were applied and are not rolled back.
    Partial { attempted: usize, failures: Vec<OpFailure> },
    /// Every write succeeded but the confirming reload did not.
    Reload(ApiError),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::NoRoomSelected => write!(f, "select a room before saving capacity"),
            ReconcileError::Partial { attempted, failures } => {
                let first = failures
                    .first()
                    .map(|fail| fail.error.message())
                    .unwrap_or_default();
                write!(
                    f,
                    "{} of {} capacity change(s) failed: {}",
                    failures.len(),
                    attempted,
                    first
                )
            }
            ReconcileError::Reload(e) => write!(f, "capacity saved but reloading failed: {}", e.message()),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::Partial { failures, .. } => failures
                .first()
                .map(|f| &f.error as &(dyn std::error::Error + 'static)),
            ReconcileError::Reload(e) => Some(e),
            ReconcileError::NoRoomSelected => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub sala: SalaId,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub noops: usize,
    /// Saved total for the room according to the reload.
    pub saved_total: u32,
}

/// Closes an editor session from outside the submitting call. Results of requests
/// still in flight are then discarded instead of being written into the editor.
#[derive(Debug, Clone)]
pub struct EditorHandle(Arc<AtomicBool>);

impl EditorHandle {
    pub fn close(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Editing session for the weekly capacity of one room at a time.
///
/// `submit` takes `&mut self`, so a second submit cannot start while one is running.
pub struct CapacityEditor {
    target: Option<SalaId>,
    grid: WeeklyGrid,
    slots: Vec<CapacidadeSala>,
    notice: NoticeSlot,
    session: EditorHandle,
}

impl CapacityEditor {
    /// Editor over an already fetched capacity collection.
    pub fn new(slots: Vec<CapacidadeSala>) -> Self {
        CapacityEditor {
            target: None,
            grid: WeeklyGrid::blank(),
            slots,
            notice: NoticeSlot::default(),
            session: EditorHandle(Arc::new(AtomicBool::new(false))),
        }
    }

    pub fn load<S: CapacityStore + ?Sized>(store: &S) -> Result<Self, ApiError> {
        Ok(Self::new(store.list_capacities()?))
    }

    /// Select `sala` and pre-fill the grid from its persisted slots.
    pub fn open(&mut self, sala: SalaId) -> EditorHandle {
        self.session.close();
        self.session = EditorHandle(Arc::new(AtomicBool::new(true)));
        self.target = Some(sala);
        self.grid = WeeklyGrid::from_slots(sala, &self.slots);
        self.notice.begin();
        self.session.clone()
    }

    pub fn close(&mut self) {
        self.session.close();
        self.reset();
    }

    fn reset(&mut self) {
        self.target = None;
        self.grid = WeeklyGrid::blank();
    }

    pub fn target(&self) -> Option<SalaId> {
        self.target
    }

    pub fn grid(&self) -> &WeeklyGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut WeeklyGrid {
        &mut self.grid
    }

    /// Last fetched capacity collection (all rooms).
    pub fn slots(&self) -> &[CapacidadeSala] {
        &self.slots
    }

    pub fn notice(&self) -> &NoticeSlot {
        &self.notice
    }

    pub fn filled_total(&self) -> u32 {
        self.grid.filled_total()
    }

    /// Saved total of the selected room, 0 when none is selected.
    pub fn saved_total(&self) -> u32 {
        self.target.map(|s| saved_total(s, &self.slots)).unwrap_or(0)
    }

    /// Advisory only: the grid holds edits that were not submitted yet.
    pub fn has_unsaved_changes(&self) -> bool {
        self.target.is_some() && self.filled_total() != self.saved_total()
    }

    /// Reconcile the grid of the selected room against the store.
    ///
    /// On success the grid and the selection are reset. On partial failure the reload
    /// still runs, so the cache shows the real mixed state; the grid is kept for review.
    pub fn submit<S: CapacityStore + ?Sized>(&mut self, store: &S) -> Result<ReconcileOutcome, ReconcileError> {
        self.notice.begin();
        let Some(sala) = self.target else {
            let err = ReconcileError::NoRoomSelected;
            self.notice.error(err.to_string());
            return Err(err);
        };
        let session = self.session.clone();

        let existing = index_slots(sala, &self.slots);
        let plan = plan(sala, &self.grid, &existing);
        info!(
            "Capacity plan for room {}: {} create(s), {} update(s), {} delete(s), {} no-op(s)",
            sala.0,
            plan.creates(),
            plan.updates(),
            plan.deletes(),
            plan.noops
        );

        let failures = apply_all(store, &plan.ops);
        // Reload only after every write has settled.
        let reloaded = store.list_capacities();

        if !session.is_open() {
            debug!("Capacity editor for room {} closed mid-flight; discarding results", sala.0);
            return match (failures.is_empty(), reloaded) {
                (true, Ok(slots)) => Ok(ReconcileOutcome {
                    sala,
                    created: plan.creates(),
                    updated: plan.updates(),
                    deleted: plan.deletes(),
                    noops: plan.noops,
                    saved_total: saved_total(sala, &slots),
                }),
                (true, Err(e)) => Err(ReconcileError::Reload(e)),
                (false, _) => Err(ReconcileError::Partial {
                    attempted: plan.ops.len(),
                    failures,
                }),
            };
        }

        match reloaded {
            Ok(slots) => self.slots = slots,
            Err(e) if failures.is_empty() => {
                let err = ReconcileError::Reload(e);
                self.notice.error(err.to_string());
                return Err(err);
            }
            Err(e) => warn!("Reload after failed capacity changes also failed: {}", e),
        }

        if !failures.is_empty() {
            let err = ReconcileError::Partial {
                attempted: plan.ops.len(),
                failures,
            };
            self.notice.error(err.to_string());
            return Err(err);
        }

        let outcome = ReconcileOutcome {
            sala,
            created: plan.creates(),
            updated: plan.updates(),
            deleted: plan.deletes(),
            noops: plan.noops,
            saved_total: saved_total(sala, &self.slots),
        };
        self.notice
            .success(format!("capacity saved for room {}", sala.0));
        session.close();
        self.reset();
        Ok(outcome)
    }
}

/// The ten slots every new room starts with: Monday to Friday, both shifts, capacity 1.
pub fn default_slots(sala: SalaId) -> Vec<NewCapacidadeSala> {
    DiaSemana::ALL
        .into_iter()
        .filter(|d| d.is_weekday())
        .flat_map(|d| Turno::ALL.into_iter().map(move |t| NewCapacidadeSala::new(sala, d, t, 1)))
        .collect()
}

/// Create the default slots of a freshly created room concurrently, then reload.
pub fn create_default_capacity<S: CapacityStore + ?Sized>(
    store: &S,
    sala: SalaId,
) -> Result<Vec<CapacidadeSala>, ReconcileError> {
    let ops = default_slots(sala)
        .into_iter()
        .map(CapacityOp::Create)
        .collect::<Vec<_>>();
    info!("Creating {} default capacity slot(s) for room {}", ops.len(), sala.0);

    let failures = apply_all(store, &ops);
    if !failures.is_empty() {
        return Err(ReconcileError::Partial {
            attempted: ops.len(),
            failures,
        });
    }
    store.list_capacities().map_err(ReconcileError::Reload)
}

/// Morning and afternoon totals per weekday across `slots`.
pub fn weekly_summary(slots: &[CapacidadeSala]) -> [(DiaSemana, u32, u32); 7] {
    DiaSemana::ALL.map(|dia| {
        let total = |turno: Turno| {
            slots
                .iter()
                .filter(|s| s.dia_semana == Some(dia) && s.turno == turno)
                .map(|s| s.capacidade)
                .fold(0u32, u32::saturating_add)
        };
        (dia, total(Turno::Manha), total(Turno::Tarde))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicI64;

    fn day(n: u8) -> DiaSemana {
        DiaSemana::try_from(n).expect("valid day")
    }

    fn slot(id: i64, sala: i64, dia: u8, turno: Turno, capacidade: u32) -> CapacidadeSala {
        CapacidadeSala {
            id: CapacidadeId(id),
            sala: SalaId(sala),
            dia_semana: Some(day(dia)),
            turno,
            capacidade,
            restricoes: String::new(),
        }
    }

    /// In-memory capacity collection recording every call.
    struct MemoryStore {
        slots: Mutex<Vec<CapacidadeSala>>,
        next_id: AtomicI64,
        calls: Mutex<Vec<String>>,
        failing: BTreeSet<CapacidadeId>,
        fail_creates: bool,
        close_on_write: Option<EditorHandle>,
    }

    impl MemoryStore {
        fn new(slots: Vec<CapacidadeSala>) -> Self {
            MemoryStore {
                slots: Mutex::new(slots),
                next_id: AtomicI64::new(100),
                calls: Mutex::new(Vec::new()),
                failing: BTreeSet::new(),
                fail_creates: false,
                close_on_write: None,
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().expect("calls lock").push(call);
            if let Some(handle) = &self.close_on_write {
                handle.close();
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }

        fn rejected(id: CapacidadeId) -> ApiError {
            ApiError::Http {
                status: 400,
                detail: Some(format!("slot {} rejected", id.0)),
            }
        }
    }

    impl CapacityStore for MemoryStore {
        fn list_capacities(&self) -> Result<Vec<CapacidadeSala>, ApiError> {
            self.calls.lock().expect("calls lock").push("list".to_string());
            Ok(self.slots.lock().expect("slots lock").clone())
        }

        fn create_capacity(&self, new: &NewCapacidadeSala) -> Result<CapacidadeSala, ApiError> {
            self.record(format!("create {}-{}", new.dia_semana, new.turno));
            if self.fail_creates {
                return Err(ApiError::Http {
                    status: 400,
                    detail: Some("Capacidade deve ser pelo menos 1.".into()),
                });
            }
            let created = CapacidadeSala {
                id: CapacidadeId(self.next_id.fetch_add(1, Ordering::SeqCst)),
                sala: new.sala,
                dia_semana: Some(new.dia_semana),
                turno: new.turno,
                capacidade: new.capacidade,
                restricoes: new.restricoes.clone(),
            };
            self.slots.lock().expect("slots lock").push(created.clone());
            Ok(created)
        }

        fn update_capacity(&self, id: CapacidadeId, slot: &CapacidadeSala) -> Result<CapacidadeSala, ApiError> {
            self.record(format!("update {}", id.0));
            if self.failing.contains(&id) {
                return Err(Self::rejected(id));
            }
            let mut slots = self.slots.lock().expect("slots lock");
            let current = slots
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or(ApiError::Http { status: 404, detail: None })?;
            *current = slot.clone();
            Ok(current.clone())
        }

        fn delete_capacity(&self, id: CapacidadeId) -> Result<(), ApiError> {
            self.record(format!("delete {}", id.0));
            if self.failing.contains(&id) {
                return Err(Self::rejected(id));
            }
            self.slots.lock().expect("slots lock").retain(|s| s.id != id);
            Ok(())
        }
    }

    #[test]
    fn empty_cells_without_slots_are_noops() {
        let p = plan(SalaId(1), &WeeklyGrid::blank(), &BTreeMap::new());
        assert!(p.ops.is_empty());
        assert_eq!(p.noops, 14);

        let mut grid = WeeklyGrid::blank();
        grid.set(day(3), Turno::Manha, "0");
        let p = plan(SalaId(1), &grid, &BTreeMap::new());
        assert!(p.ops.is_empty());
    }

    #[test]
    fn positive_cell_without_slot_creates() {
        let mut grid = WeeklyGrid::blank();
        grid.set(day(2), Turno::Manha, "3");
        let p = plan(SalaId(5), &grid, &BTreeMap::new());
        assert_eq!(
            p.ops,
            vec![CapacityOp::Create(NewCapacidadeSala {
                sala: SalaId(5),
                dia_semana: day(2),
                turno: Turno::Manha,
                capacidade: 3,
                restricoes: String::new(),
            })]
        );
        assert_eq!(p.noops, 13);
    }

    #[test]
    fn positive_cell_with_slot_updates_and_keeps_restrictions() {
        let mut existing_slot = slot(7, 5, 2, Turno::Manha, 2);
        existing_slot.restricoes = "Somente fisioterapia".into();
        let existing = index_slots(SalaId(5), &[existing_slot.clone()]);

        let mut grid = WeeklyGrid::from_slots(SalaId(5), &[existing_slot.clone()]);
        grid.set(day(2), Turno::Manha, "5");
        let p = plan(SalaId(5), &grid, &existing);

        assert_eq!(p.ops.len(), 1);
        match &p.ops[0] {
            CapacityOp::Update { id, slot } => {
                assert_eq!(*id, CapacidadeId(7));
                assert_eq!(slot.capacidade, 5);
                assert_eq!(slot.restricoes, "Somente fisioterapia");
                assert_eq!(slot.sala, SalaId(5));
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn cleared_cell_with_slot_deletes() {
        let existing = index_slots(SalaId(5), &[slot(9, 5, 4, Turno::Tarde, 1)]);
        let p = plan(SalaId(5), &WeeklyGrid::blank(), &existing);
        assert_eq!(p.ops, vec![CapacityOp::Delete { id: CapacidadeId(9) }]);
    }

    #[test]
    fn index_ignores_other_rooms_and_special_dates() {
        let mut special = slot(3, 5, 0, Turno::Manha, 1);
        special.dia_semana = None;
        let idx = index_slots(SalaId(5), &[slot(1, 5, 0, Turno::Manha, 1), slot(2, 6, 0, Turno::Manha, 1), special]);
        assert_eq!(idx.len(), 1);
        assert_eq!(slot_key_label(*idx.keys().next().expect("one key")), "0-manha");
    }

    #[test]
    fn submit_without_room_sends_nothing() {
        let store = MemoryStore::new(vec![slot(1, 5, 0, Turno::Manha, 1)]);
        let mut editor = CapacityEditor::new(store.slots.lock().expect("slots lock").clone());
        editor.grid_mut().fill_default();

        let res = editor.submit(&store);
        assert!(matches!(res, Err(ReconcileError::NoRoomSelected)));
        assert!(store.calls().is_empty());
        assert!(editor.notice().is_error());
    }

    #[test]
    fn submit_converges_and_totals_match() {
        let store = MemoryStore::new(vec![
            slot(1, 5, 0, Turno::Manha, 1),
            slot(2, 5, 1, Turno::Tarde, 2),
            slot(3, 6, 0, Turno::Manha, 4),
        ]);
        let mut editor = CapacityEditor::load(&store).expect("load");
        editor.open(SalaId(5));
        assert!(!editor.has_unsaved_changes());

        editor.grid_mut().set(day(0), Turno::Manha, "3");
        editor.grid_mut().set(day(1), Turno::Tarde, "");
        editor.grid_mut().set(day(5), Turno::Manha, "2");
        let filled = editor.filled_total();
        assert_eq!(filled, 5);
        assert!(editor.has_unsaved_changes());

        let outcome = editor.submit(&store).expect("submit");
        assert_eq!((outcome.created, outcome.updated, outcome.deleted), (1, 1, 1));
        assert_eq!(outcome.noops, 11);
        assert_eq!(outcome.saved_total, filled);
        assert_eq!(saved_total(SalaId(5), editor.slots()), filled);
        // Other rooms are untouched.
        assert_eq!(saved_total(SalaId(6), editor.slots()), 4);

        // Reload happens once, after all writes.
        let calls = store.calls();
        assert_eq!(calls.iter().filter(|c| *c == "list").count(), 2);
        assert_eq!(calls.last().map(String::as_str), Some("list"));

        // Success resets the editor.
        assert_eq!(editor.target(), None);
        assert_eq!(editor.grid(), &WeeklyGrid::blank());
        assert!(!editor.notice().is_error());
    }

    #[test]
    fn default_fill_on_blank_room_creates_ten() {
        let store = MemoryStore::new(Vec::new());
        let mut editor = CapacityEditor::load(&store).expect("load");
        editor.open(SalaId(8));
        editor.grid_mut().fill_default();

        let p = plan(SalaId(8), editor.grid(), &BTreeMap::new());
        assert_eq!(p.creates(), 10);
        assert_eq!(p.noops, 4);
        assert!(p.ops.iter().all(|op| matches!(op, CapacityOp::Create(n) if n.capacidade == 1)));

        let outcome = editor.submit(&store).expect("submit");
        assert_eq!(outcome.created, 10);
        assert_eq!(outcome.saved_total, 10);
    }

    #[test]
    fn clear_deletes_every_persisted_slot() {
        let initial = vec![
            slot(1, 5, 0, Turno::Manha, 1),
            slot(2, 5, 0, Turno::Tarde, 1),
            slot(3, 5, 6, Turno::Tarde, 3),
        ];
        let store = MemoryStore::new(initial);
        let mut editor = CapacityEditor::load(&store).expect("load");
        editor.open(SalaId(5));
        assert_eq!(editor.saved_total(), 5);
        editor.grid_mut().clear();

        let outcome = editor.submit(&store).expect("submit");
        assert_eq!(outcome.deleted, 3);
        assert_eq!(outcome.created + outcome.updated, 0);
        assert_eq!(outcome.saved_total, 0);
        assert_eq!(saved_total(SalaId(5), editor.slots()), 0);
    }

    #[test]
    fn partial_failure_is_reported_and_not_rolled_back() {
        let mut store = MemoryStore::new(vec![slot(1, 5, 0, Turno::Manha, 1), slot(2, 5, 1, Turno::Manha, 1)]);
        store.failing.insert(CapacidadeId(2));
        let mut editor = CapacityEditor::load(&store).expect("load");
        editor.open(SalaId(5));
        editor.grid_mut().clear();

        match editor.submit(&store) {
            Err(ReconcileError::Partial { attempted, failures }) => {
                assert_eq!(attempted, 2);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].op, CapacityOp::Delete { id: CapacidadeId(2) });
            }
            other => panic!("expected partial failure, got {:?}", other),
        }

        // The successful delete stays applied and the reload shows the mixed state.
        assert_eq!(editor.slots().len(), 1);
        assert_eq!(editor.slots()[0].id, CapacidadeId(2));
        assert_eq!(editor.target(), Some(SalaId(5)));
        assert!(editor.notice().is_error());
        assert_eq!(store.calls().last().map(String::as_str), Some("list"));
    }

    #[test]
    fn closed_editor_discards_in_flight_results() {
        let mut store = MemoryStore::new(vec![slot(1, 5, 0, Turno::Manha, 1)]);
        let mut editor = CapacityEditor::load(&store).expect("load");
        let handle = editor.open(SalaId(5));
        store.close_on_write = Some(handle);
        editor.grid_mut().set(day(0), Turno::Manha, "4");

        let outcome = editor.submit(&store).expect("writes still complete");
        assert_eq!(outcome.saved_total, 4);
        // The cache and selection were not touched after the close.
        assert_eq!(editor.slots()[0].capacidade, 1);
        assert_eq!(editor.target(), Some(SalaId(5)));
        assert_eq!(editor.notice().current(), None);
    }

    #[test]
    fn default_capacity_for_new_room() {
        let slots = default_slots(SalaId(4));
        assert_eq!(slots.len(), 10);
        assert!(slots.iter().all(|s| s.dia_semana.is_weekday() && s.capacidade == 1 && s.restricoes.is_empty()));

        let store = MemoryStore::new(Vec::new());
        let reloaded = create_default_capacity(&store, SalaId(4)).expect("defaults");
        assert_eq!(saved_total(SalaId(4), &reloaded), 10);
        assert_eq!(store.calls().last().map(String::as_str), Some("list"));
    }

    #[test]
    fn default_capacity_failure_skips_reload() {
        let mut store = MemoryStore::new(Vec::new());
        store.fail_creates = true;
        let err = create_default_capacity(&store, SalaId(4)).expect_err("creates fail");
        assert!(err.to_string().starts_with("10 of 10 capacity change(s) failed"));
        assert!(!store.calls().contains(&"list".to_string()));
    }

    #[test]
    fn summary_totals_per_day_and_shift() {
        let slots = vec![
            slot(1, 5, 0, Turno::Manha, 1),
            slot(2, 6, 0, Turno::Manha, 2),
            slot(3, 6, 0, Turno::Tarde, 1),
        ];
        let summary = weekly_summary(&slots);
        assert_eq!(summary[0], (day(0), 3, 1));
        assert_eq!(summary[6], (day(6), 0, 0));
    }
}
