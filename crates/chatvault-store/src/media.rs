//! Readers for attachment-like side tables: media metadata, thumbnails,
//! link previews and shared locations.

use crate::database::{key, opaque, text, Database};
use crate::error::Result;
use crate::models::{LinkPreviewRow, LocationRow, MediaRow, TableRead, ThumbnailRow};
use crate::schema::{MESSAGE_LOCATION, MESSAGE_MEDIA, MESSAGE_TEXT, MESSAGE_THUMBNAIL};

impl Database {
    pub fn read_media(&self) -> Result<Option<TableRead<MediaRow>>> {
        let Some(select) = self.projection(&MESSAGE_MEDIA, "mm")? else {
            return Ok(None);
        };
        let sql = format!("SELECT {select} FROM message_media mm ORDER BY mm.rowid");
        self.read_table(MESSAGE_MEDIA.name, &sql, [], |row| {
            Ok(MediaRow {
                message_row_id: key(row, "message_row_id")?,
                mime_type: text(row, "mime_type")?,
                file_path: text(row, "file_path")?,
                file_size: row.get("file_size")?,
                file_length: row.get("file_length")?,
                media_duration: row.get("media_duration")?,
                media_caption: text(row, "media_caption")?,
                width: row.get("width")?,
                height: row.get("height")?,
                media_name: text(row, "media_name")?,
                file_hash: text(row, "file_hash")?,
                media_key: opaque(row, "media_key")?,
                media_key_timestamp: row.get("media_key_timestamp")?,
                direct_path: text(row, "direct_path")?,
                message_url: text(row, "message_url")?,
            })
        })
        .map(Some)
    }

    pub fn read_thumbnails(&self) -> Result<Option<TableRead<ThumbnailRow>>> {
        let Some(select) = self.projection(&MESSAGE_THUMBNAIL, "t")? else {
            return Ok(None);
        };
        let sql = format!("SELECT {select} FROM message_thumbnail t ORDER BY t.rowid");
        self.read_table(MESSAGE_THUMBNAIL.name, &sql, [], |row| {
            Ok(ThumbnailRow {
                message_row_id: key(row, "message_row_id")?,
                thumbnail: opaque(row, "thumbnail")?,
            })
        })
        .map(Some)
    }

    pub fn read_link_previews(&self) -> Result<Option<TableRead<LinkPreviewRow>>> {
        let Some(select) = self.projection(&MESSAGE_TEXT, "mt")? else {
            return Ok(None);
        };
        let sql = format!("SELECT {select} FROM message_text mt ORDER BY mt.rowid");
        self.read_table(MESSAGE_TEXT.name, &sql, [], |row| {
            Ok(LinkPreviewRow {
                message_row_id: key(row, "message_row_id")?,
                url: text(row, "url")?,
                page_title: text(row, "page_title")?,
                description: text(row, "description")?,
            })
        })
        .map(Some)
    }

    pub fn read_locations(&self) -> Result<Option<TableRead<LocationRow>>> {
        let Some(select) = self.projection(&MESSAGE_LOCATION, "l")? else {
            return Ok(None);
        };
        let sql = format!("SELECT {select} FROM message_location l ORDER BY l.rowid");
        self.read_table(MESSAGE_LOCATION.name, &sql, [], |row| {
            Ok(LocationRow {
                message_row_id: key(row, "message_row_id")?,
                latitude: row.get("latitude")?,
                longitude: row.get("longitude")?,
                place_name: text(row, "place_name")?,
                place_address: text(row, "place_address")?,
            })
        })
        .map(Some)
    }
}
