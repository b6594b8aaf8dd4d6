//! # Archetype — Columnar Storage per Component Set
//!
//! An archetype is the storage bucket for every entity whose component set is
//! exactly the same. Within it, data is laid out structure-of-arrays: one
//! [`Column`] of contiguous bytes per component type, plus a parallel
//! `Vec<Entity>` mapping row index back to the entity.
//!
//! ```text
//! Archetype [Position, Velocity]
//!
//! Position: [pos0][pos1][pos2][pos3]   ← one byte buffer per type
//! Velocity: [vel0][vel1][vel2][vel3]
//! entities: [ e0 ][ e1 ][ e2 ][ e3 ]
//! ```
//!
//! Every column has the same length as the entity array; the entity at row
//! `i` owns slot `i` of every column. Iterating a query is then a straight
//! linear walk over the matching archetypes' buffers — the hot path games
//! run every tick.
//!
//! Removal is swap-remove: the last row is copied into the gap so storage
//! stays dense. That invalidates any remembered row index for the moved
//! entity, which is why the [`World`](crate::world::World) keeps an
//! entity→location side table and fixes it up after every removal.
//!
//! ## Safety
//!
//! Columns store raw bytes and are managed with `unsafe`. The invariants are
//! enforced one level up: a column is only ever touched through the
//! [`ComponentInfo`] it was created with, and typed access resolves the
//! column by `TypeId` first, so a successful lookup guarantees the cast is
//! the stored type.

use std::alloc::{self, Layout};
use std::any::TypeId;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ptr;

use crate::component::ComponentInfo;
use crate::entity::Entity;

/// Identifies an archetype within a [`World`](crate::world::World); an index
/// into its archetype list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchetypeId(pub(crate) u32);

impl ArchetypeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Hash of a sorted component-type-name set. Archetypes with equal layout
/// hashes store the same component set, and the world deduplicates on it.
pub(crate) fn layout_hash(infos: &[ComponentInfo]) -> u64 {
    let mut names: Vec<&str> = infos.iter().map(|i| i.type_name).collect();
    names.sort_unstable();
    let mut hasher = DefaultHasher::new();
    for name in names {
        name.hash(&mut hasher);
    }
    hasher.finish()
}

// ── Column ───────────────────────────────────────────────────────────────

/// A densely packed, type-erased array of component values of a single type.
///
/// Manually managed byte buffer; the element layout comes from the
/// [`ComponentInfo`] the column was created with. Growth is geometric
/// doubling starting at four slots. Zero-sized types allocate nothing and
/// only track length.
pub(crate) struct Column {
    /// Heap allocation; null while capacity is zero and for ZSTs.
    data: *mut u8,
    len: usize,
    capacity: usize,
    info: ComponentInfo,
}

// The world hands out access to column contents only under its own borrow
// rules, and every stored type is constrained to Send + Sync by `Component`.
unsafe impl Send for Column {}
unsafe impl Sync for Column {}

impl Column {
    pub fn new(info: ComponentInfo) -> Self {
        Self {
            data: ptr::null_mut(),
            len: 0,
            capacity: 0,
            info,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    fn layout_for(&self, cap: usize) -> Layout {
        Layout::from_size_align(
            self.info.size.checked_mul(cap).expect("column size overflow"),
            self.info.align,
        )
        .expect("invalid column layout")
    }

    fn grow_if_full(&mut self) {
        if self.len < self.capacity {
            return;
        }
        let new_cap = if self.capacity == 0 { 4 } else { self.capacity * 2 };
        if self.info.size == 0 {
            // ZSTs take no memory; only the bookkeeping grows.
            self.capacity = new_cap;
            return;
        }
        let new_layout = self.layout_for(new_cap);
        let new_data = unsafe {
            if self.capacity == 0 {
                alloc::alloc(new_layout)
            } else {
                alloc::realloc(self.data, self.layout_for(self.capacity), new_layout.size())
            }
        };
        if new_data.is_null() {
            alloc::handle_alloc_error(new_layout);
        }
        self.data = new_data;
        self.capacity = new_cap;
    }

    /// Pointer to the slot at `row`. For ZSTs this is a dangling but aligned
    /// pointer, never dereferenced as bytes.
    #[inline]
    fn slot(&self, row: usize) -> *mut u8 {
        debug_assert!(row < self.len);
        if self.info.size == 0 {
            return self.info.align as *mut u8;
        }
        unsafe { self.data.add(row * self.info.size) }
    }

    /// Base pointer for query iteration. Dangling-aligned for ZSTs; only
    /// valid to offset while `row < len`.
    #[inline]
    pub fn base_ptr(&self) -> *mut u8 {
        if self.info.size == 0 {
            self.info.align as *mut u8
        } else {
            self.data
        }
    }

    /// Read-only pointer to the slot at `row`.
    #[inline]
    pub fn slot_ptr(&self, row: usize) -> *const u8 {
        self.slot(row)
    }

    /// Mutable pointer to the slot at `row`.
    #[inline]
    pub fn slot_ptr_mut(&mut self, row: usize) -> *mut u8 {
        self.slot(row)
    }

    /// Append one value by copying `info.size` bytes from `src`.
    ///
    /// # Safety
    ///
    /// `src` must point at a valid, initialized value of the column's type.
    /// Ownership moves into the column; the caller must not drop the source.
    pub unsafe fn push_raw(&mut self, src: *const u8) {
        self.grow_if_full();
        if self.info.size > 0 {
            unsafe {
                let dst = self.data.add(self.len * self.info.size);
                ptr::copy_nonoverlapping(src, dst, self.info.size);
            }
        }
        self.len += 1;
    }

    /// Drop the value at `row` and move the last value into the gap.
    pub fn swap_remove_drop(&mut self, row: usize) {
        assert!(row < self.len, "column row out of bounds");
        unsafe {
            if let Some(drop_fn) = self.info.drop_fn {
                if self.info.size > 0 {
                    drop_fn(self.slot(row));
                } else {
                    // ZST values can still have drop glue.
                    drop_fn(self.info.align as *mut u8);
                }
            }
            self.move_last_into(row);
        }
        self.len -= 1;
    }

    /// Forget the value at `row` (its bytes were moved elsewhere) and move
    /// the last value into the gap.
    ///
    /// # Safety
    ///
    /// The value at `row` must already have been copied out; it is not
    /// dropped here.
    pub unsafe fn swap_remove_forget(&mut self, row: usize) {
        debug_assert!(row < self.len);
        unsafe {
            self.move_last_into(row);
        }
        self.len -= 1;
    }

    /// Copy the last row's bytes over `row` (no-op when `row` is last).
    unsafe fn move_last_into(&mut self, row: usize) {
        let last = self.len - 1;
        if row != last && self.info.size > 0 {
            unsafe {
                let src = self.data.add(last * self.info.size);
                let dst = self.data.add(row * self.info.size);
                ptr::copy_nonoverlapping(src, dst, self.info.size);
            }
        }
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        if let Some(drop_fn) = self.info.drop_fn {
            for row in 0..self.len {
                unsafe {
                    if self.info.size > 0 {
                        drop_fn(self.slot(row));
                    } else {
                        drop_fn(self.info.align as *mut u8);
                    }
                }
            }
        }
        if self.info.size > 0 && self.capacity > 0 {
            unsafe {
                alloc::dealloc(self.data, self.layout_for(self.capacity));
            }
        }
    }
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("type", &self.info.type_name)
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .finish()
    }
}

// ── Archetype ────────────────────────────────────────────────────────────

/// Storage for all entities sharing one exact component set.
///
/// The descriptor list is sorted by `TypeId` at construction and never
/// changes afterwards; columns are parallel to it. Lookup is a binary search
/// over the sorted descriptors.
pub struct Archetype {
    id: ArchetypeId,
    layout_hash: u64,
    /// Sorted by `TypeId`; fixed for the archetype's lifetime.
    infos: Vec<ComponentInfo>,
    /// Parallel to `infos`.
    columns: Vec<Column>,
    /// Parallel to the column rows.
    entities: Vec<Entity>,
}

impl Archetype {
    /// Create an empty archetype for the given component set. Descriptors
    /// are sorted here; duplicates are a caller bug.
    pub(crate) fn new(id: ArchetypeId, mut infos: Vec<ComponentInfo>) -> Self {
        infos.sort_unstable_by_key(|info| info.type_id);
        debug_assert!(
            infos.windows(2).all(|w| w[0].type_id != w[1].type_id),
            "duplicate component type in archetype"
        );
        let hash = layout_hash(&infos);
        let columns = infos.iter().map(|info| Column::new(info.clone())).collect();
        Self {
            id,
            layout_hash: hash,
            infos,
            columns,
            entities: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    #[inline]
    pub(crate) fn layout_hash(&self) -> u64 {
        self.layout_hash
    }

    /// The sorted component descriptors defining this archetype.
    #[inline]
    pub(crate) fn infos(&self) -> &[ComponentInfo] {
        &self.infos
    }

    /// Component type ids, in descriptor order.
    pub fn type_ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.infos.iter().map(|info| info.type_id)
    }

    #[inline]
    fn column_index(&self, type_id: TypeId) -> Option<usize> {
        self.infos
            .binary_search_by_key(&type_id, |info| info.type_id)
            .ok()
    }

    /// Whether this archetype stores the given component type.
    #[inline]
    pub fn has(&self, type_id: TypeId) -> bool {
        self.column_index(type_id).is_some()
    }

    /// Number of entities stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The entities stored here, in row order.
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Append an entity to the row array, completing a row whose column
    /// values were pushed via [`push_value`](Self::push_value).
    ///
    /// Returns the new row index.
    pub(crate) fn push_entity(&mut self, entity: Entity) -> usize {
        let row = self.entities.len();
        self.entities.push(entity);
        row
    }

    /// Remove the row, dropping its values and keeping storage dense.
    ///
    /// Returns the entity that was moved into `row`, if the removed row was
    /// not the last one.
    pub(crate) fn swap_remove_row(&mut self, row: usize) -> Option<Entity> {
        for column in &mut self.columns {
            column.swap_remove_drop(row);
        }
        self.entities.swap_remove(row);
        if row < self.entities.len() {
            Some(self.entities[row])
        } else {
            None
        }
    }

    /// Migrate one entity's row into `target`, matching columns by type id.
    ///
    /// Shared component bytes are copied straight from column to column;
    /// components the target does not have are dropped. Columns that exist
    /// only in the target are NOT filled — the caller must push exactly one
    /// value into each of them (and nothing else) before the target is used.
    ///
    /// Returns the source entity that was swapped into `row`, if any.
    pub(crate) fn move_row_to(&mut self, row: usize, target: &mut Archetype) -> Option<Entity> {
        let entity = self.entities[row];
        target.entities.push(entity);
        for (idx, info) in self.infos.iter().enumerate() {
            match target.column_index(info.type_id) {
                Some(t_idx) => unsafe {
                    let src = self.columns[idx].slot_ptr(row);
                    target.columns[t_idx].push_raw(src);
                    self.columns[idx].swap_remove_forget(row);
                },
                None => {
                    self.columns[idx].swap_remove_drop(row);
                }
            }
        }
        self.entities.swap_remove(row);
        if row < self.entities.len() {
            Some(self.entities[row])
        } else {
            None
        }
    }

    /// Push one value into a single column. Used to fill the extra column
    /// after [`move_row_to`](Self::move_row_to), and for single-value spawns.
    ///
    /// # Safety
    ///
    /// Same contract as [`Column::push_raw`]; additionally the caller is
    /// responsible for restoring the parallel-length invariant before the
    /// archetype is used.
    pub(crate) unsafe fn push_value(&mut self, type_id: TypeId, src: *const u8) {
        let idx = self
            .column_index(type_id)
            .expect("component type not in archetype");
        unsafe {
            self.columns[idx].push_raw(src);
        }
    }

    /// Shared reference to the component of type `T` at `row`.
    ///
    /// Sound without further checks: the column is resolved by
    /// `TypeId::of::<T>()`, so a hit means the column stores `T`.
    pub(crate) fn get<T: 'static>(&self, row: usize) -> Option<&T> {
        let idx = self.column_index(TypeId::of::<T>())?;
        let column = &self.columns[idx];
        if row >= column.len() {
            return None;
        }
        Some(unsafe { &*(column.slot_ptr(row) as *const T) })
    }

    /// Mutable reference to the component of type `T` at `row`.
    pub(crate) fn get_mut<T: 'static>(&mut self, row: usize) -> Option<&mut T> {
        let idx = self.column_index(TypeId::of::<T>())?;
        let column = &mut self.columns[idx];
        if row >= column.len() {
            return None;
        }
        Some(unsafe { &mut *(column.slot_ptr_mut(row) as *mut T) })
    }

    /// Raw read-only pointer to the slot for `type_id` at `row`. Used by the
    /// registry to serialize values it knows the type of.
    pub(crate) fn slot_ptr(&self, row: usize, type_id: TypeId) -> Option<*const u8> {
        let idx = self.column_index(type_id)?;
        let column = &self.columns[idx];
        if row >= column.len() {
            return None;
        }
        Some(column.slot_ptr(row))
    }

    /// Base pointer of the column for `type_id`, for query iteration.
    pub(crate) fn column_base(&self, type_id: TypeId) -> Option<*mut u8> {
        let idx = self.column_index(type_id)?;
        Some(self.columns[idx].base_ptr())
    }

    #[cfg(debug_assertions)]
    pub(crate) fn assert_consistent(&self) {
        for column in &self.columns {
            debug_assert_eq!(column.len(), self.entities.len());
        }
    }
}

impl std::fmt::Debug for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field(
                "types",
                &self.infos.iter().map(|i| i.type_name).collect::<Vec<_>>(),
            )
            .field("entities", &self.entities.len())
            .finish()
    }
}
