//! Multi-module assemblies.
//!
//! The manifest module names the other modules of its assembly in the `File` table. An
//! [`Assembly`] loads the manifest eagerly and opens each sibling module from the manifest's
//! directory on first request. Every sibling slot is guarded by its own lock, so a module is
//! mapped at most once no matter how many threads ask for it.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::{
    config::LoadOptions,
    metadata::{cilview::CilView, tables::FileRaw, token::Token},
    Error, Result,
};

struct ModuleSlot {
    name: String,
    token: Token,
    view: Mutex<Option<Arc<CilView>>>,
}

/// A manifest module together with the sibling modules it lists.
pub struct Assembly {
    manifest: Arc<CilView>,
    directory: Option<PathBuf>,
    options: LoadOptions,
    modules: Vec<ModuleSlot>,
}

impl Assembly {
    /// Load the manifest module at `path`.
    ///
    /// # Errors
    /// Returns any error of [`CilView::from_file`], and [`crate::Error::Malformed`] if a `File`
    /// row does not name a plain file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_file_with(path, &LoadOptions::default())
    }

    /// Load the manifest module at `path` with explicit options.
    ///
    /// # Errors
    /// Same as [`Assembly::from_file`].
    pub fn from_file_with(path: &Path, options: &LoadOptions) -> Result<Self> {
        let manifest = CilView::from_file_with(path, options)?;
        let directory = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        Self::new(manifest, Some(directory), *options)
    }

    /// Load a manifest module held in memory. Its siblings cannot be opened.
    ///
    /// # Errors
    /// Same as [`CilView::from_mem`].
    pub fn from_mem(data: Vec<u8>) -> Result<Self> {
        let options = LoadOptions::default();
        Self::new(CilView::from_mem_with(data, &options)?, None, options)
    }

    fn new(manifest: CilView, directory: Option<PathBuf>, options: LoadOptions) -> Result<Self> {
        let modules = module_slots(&manifest)?;
        log::debug!("Assembly lists {} sibling modules", modules.len());

        Ok(Assembly {
            manifest: Arc::new(manifest),
            directory,
            options,
            modules,
        })
    }

    /// The manifest module
    #[must_use]
    pub fn manifest(&self) -> &Arc<CilView> {
        &self.manifest
    }

    /// Number of sibling modules
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// File names of the sibling modules, in `File` table order
    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|slot| slot.name.as_str())
    }

    /// The `File` token that lists sibling module `index`
    #[must_use]
    pub fn module_token(&self, index: usize) -> Option<Token> {
        self.modules.get(index).map(|slot| slot.token)
    }

    /// Sibling module `index`, opened on first use.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for an unknown index,
    /// [`crate::Error::NotSupported`] for an assembly loaded from memory,
    /// [`crate::Error::Disposed`] once [`Assembly::dispose`] ran,
    /// [`crate::Error::LockError`] if a previous open panicked, and any error of
    /// [`CilView::from_file`].
    pub fn module(&self, index: usize) -> Result<Arc<CilView>> {
        let Some(slot) = self.modules.get(index) else {
            return Err(out_of_bounds_error!());
        };
        let Some(directory) = &self.directory else {
            return Err(Error::NotSupported(format!(
                "Module {} of an assembly loaded from memory",
                slot.name
            )));
        };

        // dispose poisons the manifest before it walks the slots
        let mut view = slot.view.lock().map_err(|_| Error::LockError)?;
        if self.manifest.is_disposed() {
            return Err(Error::Disposed);
        }
        if let Some(view) = view.as_ref() {
            return Ok(Arc::clone(view));
        }

        let path = directory.join(&slot.name);
        log::debug!("Opening module {}", path.display());
        let opened = Arc::new(CilView::from_file_with(&path, &self.options)?);
        *view = Some(Arc::clone(&opened));
        Ok(opened)
    }

    /// Sibling module called `name`, `None` if the assembly does not list it.
    ///
    /// # Errors
    /// Same as [`Assembly::module`].
    pub fn module_by_name(&self, name: &str) -> Result<Option<Arc<CilView>>> {
        match self.modules.iter().position(|slot| slot.name == name) {
            Some(index) => self.module(index).map(Some),
            None => Ok(None),
        }
    }

    /// Number of sibling modules opened so far
    #[must_use]
    pub fn loaded_modules(&self) -> usize {
        self.modules
            .iter()
            .filter(|slot| slot.view.lock().is_ok_and(|view| view.is_some()))
            .count()
    }

    /// Dispose the manifest and every opened sibling module.
    ///
    /// Siblings that are not open yet can no longer be opened afterwards.
    pub fn dispose(&self) {
        self.manifest.dispose();
        for slot in &self.modules {
            if let Ok(view) = slot.view.lock() {
                if let Some(view) = view.as_ref() {
                    view.dispose();
                }
            }
        }
    }
}

impl std::fmt::Debug for Assembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assembly")
            .field("manifest", &self.manifest)
            .field("modules", &self.module_names().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn module_slots(manifest: &CilView) -> Result<Vec<ModuleSlot>> {
    let (Some(tables), Some(strings)) = (manifest.tables(), manifest.strings()) else {
        return Ok(Vec::new());
    };
    let Some(files) = tables.table::<FileRaw>() else {
        return Ok(Vec::new());
    };

    let mut modules = Vec::new();
    for index in 0..files.row_count() {
        let file = files.get(index)?;
        if !file.has_metadata() {
            continue;
        }

        let name = strings.get(file.name)?;
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(malformed_error!("Invalid module file name - {:?}", name));
        }

        modules.push(ModuleSlot {
            name: name.to_string(),
            token: file.token,
            view: Mutex::new(None),
        });
    }

    Ok(modules)
}
