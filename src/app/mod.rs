pub mod actions;
pub mod state;

use crate::collections::{self, CollectionStore};
use crate::color::{contrast_of, normalize_hex};
use crate::config::Config;
use crate::model::{Collection, Item, StorageRecord, Swatch};
use crate::storage::KeyValueStore;
use actions::Action;
use state::AppState;

/// Headless controller for the color grid: two random palettes, the
/// selected colors, and the saved lists behind them.
pub struct App<S> {
    cfg: Config,
    state: AppState,
    store: CollectionStore<S>,
}

impl<S: KeyValueStore> App<S> {
    /// Builds the app and makes sure the saved record exists and parses.
    pub fn new(cfg: Config, backend: S) -> collections::Result<Self> {
        let mut store = CollectionStore::new(backend);
        let record = store.load(&cfg.storage.key, StorageRecord::default())?;
        tracing::debug!(lists = record.item_lists.len(), "opened saved lists");

        let button_color = cfg
            .ui
            .button_color
            .clone()
            .unwrap_or_else(crate::color::random_color);
        let mut state = AppState::new(button_color);
        state.regenerate(cfg.palette.size);

        Ok(Self { cfg, state, store })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn store(&self) -> &CollectionStore<S> {
        &self.store
    }

    pub fn key(&self) -> &str {
        &self.cfg.storage.key
    }

    pub fn palettes(&self) -> &[Vec<Item>] {
        &self.state.palettes
    }

    pub fn button_color(&self) -> &str {
        &self.state.button_color
    }

    pub fn selected_items(&self) -> &[Item] {
        self.state.selected_items.current()
    }

    pub fn selected_lists(&self) -> &[Collection] {
        self.state.selected_lists.current()
    }

    pub fn handle_action(&mut self, action: Action) -> collections::Result<()> {
        match action {
            Action::Regenerate => self.state.regenerate(self.cfg.palette.size),
            Action::Select(item) => self.select(item),
            Action::Deselect(item) => self.deselect(&item),
            Action::SaveSelection { name } => {
                self.save_selection(name)?;
            }
            Action::LoadList(id) => {
                self.load_list(id)?;
            }
            Action::RemoveList(id) => self.remove_list(id)?,
            Action::Reset => self.reset()?,
        }
        Ok(())
    }

    /// A fresh item for `color`, with an id from this app's counter.
    pub fn new_item(&mut self, color: impl Into<String>) -> Item {
        Item::from_color(self.state.ids.next_id(), "name", color)
    }

    /// Select a color given as hex text, stored in `#RRGGBB` form. Returns
    /// false when `color` is not a hex color.
    pub fn select_hex(&mut self, color: &str) -> bool {
        let Some(color) = normalize_hex(color) else {
            return false;
        };
        let item = self.new_item(color);
        self.select(item);
        true
    }

    pub fn select(&mut self, item: Item) {
        self.state.selected_items.add(item);
    }

    pub fn deselect(&mut self, item: &Item) {
        self.state.selected_items.remove(item);
    }

    /// Save the selected colors as a new list.
    pub fn save_selection(&mut self, name: Option<String>) -> collections::Result<Collection> {
        let id = self.state.ids.next_id();
        let list = self.state.selected_items.current().to_vec();
        let background_color = list
            .first()
            .map(|i| i.color.clone())
            .unwrap_or_else(|| self.state.button_color.clone());
        let background_image = (!list.is_empty())
            .then(|| crate::color::linear_gradient(&list, self.cfg.ui.gradient_angle));

        let collection = Collection {
            id,
            name: name.unwrap_or_else(|| format!("list {id}")),
            list,
            background_color,
            background_image,
        };
        self.store
            .append_collection(&self.cfg.storage.key, collection.clone())?;
        Ok(collection)
    }

    /// Display entries for the saved-lists area.
    pub fn saved_lists(&mut self) -> collections::Result<Vec<Item>> {
        let record = self
            .store
            .load(&self.cfg.storage.key, StorageRecord::default())?;
        Ok(record
            .item_lists
            .iter()
            .map(|c| Item {
                id: c.id,
                name: c.name.clone(),
                color: c.color().to_string(),
                background_color: c.background_color.clone(),
                background_image: c.background_image.clone(),
                position: None,
            })
            .collect())
    }

    /// Make a saved list the current selection. Returns false when no list
    /// has that id.
    pub fn load_list(&mut self, id: i64) -> collections::Result<bool> {
        let Some(collection) = self.store.find_collection(&self.cfg.storage.key, id)? else {
            tracing::debug!(id, "no saved list with that id");
            return Ok(false);
        };
        self.state.selected_items.replace_all(collection.list.clone());
        self.state.selected_lists.replace_all(vec![collection]);
        Ok(true)
    }

    pub fn remove_list(&mut self, id: i64) -> collections::Result<()> {
        if let Some(selected) = self.state.selected_lists.current().first().cloned() {
            // single-select: any removal clears the highlighted list
            self.state.selected_lists.remove(&selected);
        }
        self.store.remove_collection(&self.cfg.storage.key, id)
    }

    /// Forget every saved list and empty both selections.
    pub fn reset(&mut self) -> collections::Result<()> {
        self.store.clear(&self.cfg.storage.key)?;
        self.state.clear_selection();
        Ok(())
    }
}

/// Clear the saved lists without parsing them first, so a corrupt record
/// can still be recovered from.
pub fn reset_saved<S: KeyValueStore>(cfg: &Config, backend: S) -> collections::Result<()> {
    CollectionStore::new(backend).clear(&cfg.storage.key)
}

/// The stored record exactly as written, corrupt or not.
pub fn dump_saved<S: KeyValueStore>(cfg: &Config, backend: S) -> collections::Result<Option<String>> {
    CollectionStore::new(backend).raw(&cfg.storage.key)
}

/// One numbered display line for an item, with its readable text color.
pub fn describe_item(index: usize, item: &Item) -> String {
    format!(
        "{:02}. {}  text={}",
        index + 1,
        item.color,
        contrast_of(&item.background_color)
    )
}
