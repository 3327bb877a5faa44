use crate::model::Item;

#[derive(Debug, Clone)]
pub enum Action {
    /// New random palettes
    Regenerate,
    Select(Item),
    Deselect(Item),
    SaveSelection { name: Option<String> },
    LoadList(i64),
    RemoveList(i64),
    Reset,
}
