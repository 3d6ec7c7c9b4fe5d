//! Module-image ranges resolved through the Windows loader.

use std::mem::size_of;

use windows::Win32::Foundation::HMODULE;
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::ProcessStatus::{GetModuleInformation, MODULEINFO};
use windows::Win32::System::Threading::GetCurrentProcess;
use windows::core::HSTRING;

use crate::error::{Error, Result};
use crate::region::ScanRange;

impl ScanRange<'static> {
    /// Range covering a loaded module's image, `[base, base + SizeOfImage)`.
    ///
    /// The image must stay loaded while the range is scanned; scanning a
    /// module that can be freed concurrently is on the caller.
    pub fn module(name: &str) -> Result<Self> {
        let handle = unsafe { GetModuleHandleW(&HSTRING::from(name)) }
            .map_err(|_| Error::ModuleNotFound(name.to_string()))?;
        Self::from_module_handle(handle, name)
    }

    /// Range covering the main executable's image.
    pub fn main_module() -> Result<Self> {
        // SAFETY: a null module name yields the handle of the executable
        // that started the process.
        let handle = unsafe { GetModuleHandleW(None) }.map_err(|e| Error::ModuleQueryFailed {
            name: "main executable".to_string(),
            message: e.message(),
        })?;
        Self::from_module_handle(handle, "main executable")
    }

    fn from_module_handle(handle: HMODULE, name: &str) -> Result<Self> {
        let mut info = MODULEINFO::default();
        // SAFETY: handle refers to a module loaded in the current process;
        // GetModuleInformation fills `info` with its base and image size.
        unsafe {
            GetModuleInformation(
                GetCurrentProcess(),
                handle,
                &mut info,
                size_of::<MODULEINFO>() as u32,
            )
        }
        .map_err(|e| Error::ModuleQueryFailed {
            name: name.to_string(),
            message: e.message(),
        })?;

        let base = info.lpBaseOfDll as usize;
        // SAFETY: the loader maps the whole image readable while the module
        // stays loaded.
        unsafe { Self::from_bounds(base, base + info.SizeOfImage as usize) }
    }
}
