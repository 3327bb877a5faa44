use crate::model::Swatch;

/// Working set of selected swatches, at most one per color.
#[derive(Debug, Clone)]
pub struct SelectionSet<T> {
    items: Vec<T>,
    single_select: bool,
}

impl<T> Default for SelectionSet<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            single_select: false,
        }
    }
}

impl<T: Swatch> SelectionSet<T> {
    /// Seed a selection. `initial` is taken as-is, duplicates included.
    pub fn new(initial: Vec<T>, single_select: bool) -> Self {
        Self {
            items: initial,
            single_select,
        }
    }

    pub fn single() -> Self {
        Self::new(Vec::new(), true)
    }

    /// Add an item unless one with the same color is already selected.
    /// In single-select mode the item replaces the current selection.
    pub fn add(&mut self, item: T) {
        if self.contains_color(item.color()) {
            return;
        }
        if self.single_select {
            self.items.clear();
        }
        self.items.push(item);
    }

    /// Remove by color. In single-select mode this always empties the set.
    pub fn remove(&mut self, item: &T) {
        if self.single_select {
            self.items.clear();
            return;
        }
        let color = item.color();
        self.items.retain(|i| i.color() != color);
    }

    /// Overwrite the selection without any uniqueness check
    pub fn replace_all(&mut self, items: Vec<T>) {
        self.items = items;
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn current(&self) -> &[T] {
        &self.items
    }

    pub fn contains_color(&self, color: &str) -> bool {
        self.items.iter().any(|i| i.color() == color)
    }

    pub fn is_single_select(&self) -> bool {
        self.single_select
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
