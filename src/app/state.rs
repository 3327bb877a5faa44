use crate::model::{Collection, IdGen, Item};
use crate::selection::SelectionSet;

pub struct AppState {
    /// One palette per random-color area
    pub palettes: [Vec<Item>; 2],
    pub selected_items: SelectionSet<Item>,
    pub selected_lists: SelectionSet<Collection>,
    pub button_color: String,
    pub ids: IdGen,
}

impl AppState {
    pub fn new(button_color: String) -> Self {
        Self {
            palettes: [Vec::new(), Vec::new()],
            selected_items: SelectionSet::default(),
            selected_lists: SelectionSet::single(),
            button_color,
            ids: IdGen::new(),
        }
    }

    /// Fill both palettes with fresh random colors.
    pub fn regenerate(&mut self, size: usize) {
        for palette in &mut self.palettes {
            *palette = crate::color::random_palette(size)
                .into_iter()
                .map(|color| Item::from_color(self.ids.next_id(), "name", color))
                .collect();
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected_items.clear();
        self.selected_lists.clear();
    }
}
