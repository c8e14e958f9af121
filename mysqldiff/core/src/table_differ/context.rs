use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};

/// Scratch state shared by the five passes of one table pair. Reset for
/// every pair.
#[derive(Debug, Default)]
pub(crate) struct DifferContext {
    /// Pending `CHANGE COLUMN` tail to fuse into the DROP PRIMARY KEY when
    /// the old key held an auto-increment column. Emitting the change on its
    /// own would leave the column auto-increment but unindexed.
    pub(crate) changed_pk_auto_col: Option<String>,
    /// The fields pass already attached the new primary key to a column DDL.
    pub(crate) added_pk: bool,
    /// The column whose ADD COLUMN carried the new primary key.
    pub(crate) added_pk_col: Option<String>,
    pub(crate) dropped_columns: BTreeSet<String>,
    /// A column turned into CHAR(0); index rebuilds touching it inherit the
    /// recorded weight so they trail the conversion.
    pub(crate) changed_to_empty_char_col: Option<EmptyCharChange>,
    /// An auto-increment column whose backing index the index pass still
    /// owes.
    pub(crate) added_index: Option<AddedIndex>,
    /// Weight of the ADD COLUMN a foreign key depends on; the FK recreate
    /// inherits it so it lands after the column exists.
    pub(crate) added_for_fk: BTreeMap<String, u8>,
    /// Scaffolding indexes added during the passes, name → covered column.
    /// Dropped at the very end unless the column itself was dropped.
    pub(crate) temporary_indexes: IndexMap<String, String>,
    /// Scaffolding indexes that ended up as the backing index of a live
    /// foreign key. The cleanup leaves them in place: the server refuses to
    /// drop a constraint's only index.
    pub(crate) preserved_indexes: BTreeSet<String>,
    pub(crate) added_cols: BTreeSet<String>,
    /// Columns with a timestamp default; operations touching them sink to
    /// the bottom of the plan.
    pub(crate) timestamps: BTreeSet<String>,
}

#[derive(Debug)]
pub(crate) struct AddedIndex {
    pub(crate) field: String,
    /// The column is newly added (not changed): its ADD COLUMN was emitted
    /// with AUTO_INCREMENT stripped, and the restore CHANGE COLUMN rides
    /// with the backing index.
    pub(crate) is_new: bool,
    /// The full target-side definition, including AUTO_INCREMENT.
    pub(crate) definition: String,
}

#[derive(Debug)]
pub(crate) struct EmptyCharChange {
    pub(crate) field: String,
    pub(crate) weight: u8,
}
