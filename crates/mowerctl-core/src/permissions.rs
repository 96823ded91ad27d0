use crate::CoreError;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

const DIR_MODE: u32 = 0o777;
const NODE_MODE: u32 = 0o666;

/// Recursively open up the USB bus device tree.
///
/// Device permissions under the bus root are regularly lost across host
/// restarts; this coarse reset keeps the instances able to open their
/// serial devices. It is not an access-control mechanism. Symlinks are left
/// untouched. Returns the number of entries changed.
pub fn widen_usb_permissions(root: &Path) -> Result<usize, CoreError> {
    let meta = std::fs::symlink_metadata(root)?;
    let mut changed = 0;
    widen(root, meta.is_dir(), &mut changed)?;
    Ok(changed)
}

fn widen(path: &Path, is_dir: bool, changed: &mut usize) -> Result<(), CoreError> {
    let mode = if is_dir { DIR_MODE } else { NODE_MODE };
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    *changed += 1;

    if is_dir {
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_symlink() {
                continue;
            }
            widen(&entry.path(), file_type.is_dir(), changed)?;
        }
    }
    Ok(())
}
