/*!
 * Source and output document handling.
 *
 * - `package`: reading and atomically writing the zip container
 * - `text_nodes`: locating `<w:t>` text nodes and rewriting their content
 */

pub mod package;
pub mod text_nodes;

pub use self::package::{DocxPackage, MAIN_DOCUMENT_PART, PackageEntry};
pub use self::text_nodes::{TextNode, is_translatable, replace_text_nodes, scan_text_nodes};
