//! PE/ELF image loading.
//!
//! The loader peeks the magic itself, hands header parsing to goblin, and
//! keeps one owned copy of each section's raw bytes. Everything downstream
//! works on addresses, so an [`Image`] outlives any decoder state.

use std::fs;
use std::path::{Path, PathBuf};

use goblin::elf::section_header::SHT_NOBITS;
use goblin::Object;
use log::{debug, info};

/// Errors surfaced to the user. Everything else in the pipeline degrades
/// locally instead of failing the run.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("failed to open {path}: {source}")]
    OpenFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported or unknown file format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("malformed {format} image {path}: {detail}")]
    MalformedHeader {
        path: PathBuf,
        format: &'static str,
        detail: String,
    },
}

/// One section with its raw contents.
#[derive(Debug, Clone)]
pub struct SectionInfo {
    pub name: String,
    pub virtual_address: u64,
    pub size: u64,
    pub data: Vec<u8>,
}

/// A loaded executable image.
#[derive(Debug)]
pub struct Image {
    path: PathBuf,
    image_base: u64,
    sections: Vec<SectionInfo>,
}

impl Image {
    /// Load and parse a PE or ELF file.
    pub fn load(path: impl AsRef<Path>) -> Result<Image, LoaderError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| LoaderError::OpenFailure {
            path: path.to_path_buf(),
            source,
        })?;

        if data.len() < 4 {
            return Err(LoaderError::UnsupportedFormat { path: path.to_path_buf() });
        }

        match &data[..4] {
            [0x4d, 0x5a, _, _] => {
                debug!("{}: PE image", path.display());
                Self::load_pe(path, &data)
            }
            [0x7f, b'E', b'L', b'F'] => {
                debug!("{}: ELF image", path.display());
                Self::load_elf(path, &data)
            }
            _ => Err(LoaderError::UnsupportedFormat { path: path.to_path_buf() }),
        }
    }

    fn load_pe(path: &Path, data: &[u8]) -> Result<Image, LoaderError> {
        let malformed = |detail: String| LoaderError::MalformedHeader {
            path: path.to_path_buf(),
            format: "PE",
            detail,
        };

        let pe = match Object::parse(data) {
            Ok(Object::PE(pe)) => pe,
            Ok(_) => return Err(malformed("not a PE object".into())),
            Err(e) => return Err(malformed(e.to_string())),
        };

        if !pe.is_64 {
            return Err(malformed("expected a PE32+ (64-bit) image".into()));
        }

        let mut sections = Vec::new();
        for sect in &pe.sections {
            let name = sect.name().unwrap_or("").to_string();
            let start = sect.pointer_to_raw_data as usize;
            let size = sect.size_of_raw_data as usize;
            let raw = slice_file(data, start, size);

            debug!(
                "section {:?}: va {:#x}, raw size {:#x}",
                name, sect.virtual_address, sect.size_of_raw_data
            );

            sections.push(SectionInfo {
                name,
                virtual_address: sect.virtual_address as u64,
                size: sect.size_of_raw_data as u64,
                data: raw,
            });
        }

        info!(
            "{}: PE32+, image base {:#x}, {} sections",
            path.display(),
            pe.image_base,
            sections.len()
        );

        Ok(Image {
            path: path.to_path_buf(),
            image_base: pe.image_base as u64,
            sections,
        })
    }

    fn load_elf(path: &Path, data: &[u8]) -> Result<Image, LoaderError> {
        let malformed = |detail: String| LoaderError::MalformedHeader {
            path: path.to_path_buf(),
            format: "ELF",
            detail,
        };

        let elf = match Object::parse(data) {
            Ok(Object::Elf(elf)) => elf,
            Ok(_) => return Err(malformed("not an ELF object".into())),
            Err(e) => return Err(malformed(e.to_string())),
        };

        let mut sections = Vec::new();
        for sh in &elf.section_headers {
            let Some(name) = elf.shdr_strtab.get_at(sh.sh_name) else { continue };
            if name.is_empty() {
                continue;
            }

            let raw = if sh.sh_type == SHT_NOBITS {
                Vec::new()
            } else {
                slice_file(data, sh.sh_offset as usize, sh.sh_size as usize)
            };

            debug!("section {:?}: va {:#x}, size {:#x}", name, sh.sh_addr, sh.sh_size);

            sections.push(SectionInfo {
                name: name.to_string(),
                virtual_address: sh.sh_addr,
                size: sh.sh_size,
                data: raw,
            });
        }

        // ELF section headers carry their own virtual addresses.
        info!("{}: ELF, {} sections", path.display(), sections.len());

        Ok(Image {
            path: path.to_path_buf(),
            image_base: 0,
            sections,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Linker-preferred load address; 0 for ELF.
    pub fn image_base(&self) -> u64 {
        self.image_base
    }

    pub fn sections(&self) -> &[SectionInfo] {
        &self.sections
    }

    /// First section whose name starts with `.text`. A missing code section
    /// is not a load error; the driver reports an empty diff instead.
    pub fn text_section(&self) -> Option<&SectionInfo> {
        self.sections
            .iter()
            .find(|s| s.name.as_bytes().starts_with(b".text"))
    }
}

fn slice_file(data: &[u8], start: usize, size: usize) -> Vec<u8> {
    if start >= data.len() || size == 0 {
        return Vec::new();
    }
    let end = start.saturating_add(size).min(data.len());
    data[start..end].to_vec()
}
