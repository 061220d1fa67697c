//! EWS SOAP request bodies and response parsing

use anyhow::{Context, Result, bail};
use base64::prelude::*;
use log::debug;
use quick_xml::Reader;
use quick_xml::escape::{escape, resolve_predefined_entity};
use quick_xml::events::{BytesRef, BytesStart, Event};

use crate::models::{ItemId, SourceMessage};

/// Schema version sent in every request header
const REQUEST_SERVER_VERSION: &str = "Exchange2010_SP2";

/// Counters returned when binding a folder
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FolderInfo {
    pub total_count: u32,
    pub unread_count: u32,
}

fn envelope(body: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/""#,
            r#" xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types""#,
            r#" xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages">"#,
            r#"<soap:Header><t:RequestServerVersion Version="{}"/></soap:Header>"#,
            r#"<soap:Body>{}</soap:Body></soap:Envelope>"#
        ),
        REQUEST_SERVER_VERSION, body
    )
}

fn item_id_element(item: &ItemId) -> String {
    match &item.change_key {
        Some(change_key) => format!(
            r#"<t:ItemId Id="{}" ChangeKey="{}"/>"#,
            escape(item.id.as_str()),
            escape(change_key.as_str())
        ),
        None => format!(r#"<t:ItemId Id="{}"/>"#, escape(item.id.as_str())),
    }
}

/// Bind the inbox, returning its item counters
pub fn get_inbox_request() -> String {
    envelope(concat!(
        "<m:GetFolder>",
        "<m:FolderShape><t:BaseShape>Default</t:BaseShape></m:FolderShape>",
        r#"<m:FolderIds><t:DistinguishedFolderId Id="inbox"/></m:FolderIds>"#,
        "</m:GetFolder>"
    ))
}

/// List one page of the inbox with ids and read flags only
pub fn find_items_request(page_size: usize, offset: usize) -> String {
    envelope(&format!(
        concat!(
            r#"<m:FindItem Traversal="Shallow">"#,
            "<m:ItemShape><t:BaseShape>IdOnly</t:BaseShape>",
            r#"<t:AdditionalProperties><t:FieldURI FieldURI="message:IsRead"/></t:AdditionalProperties>"#,
            "</m:ItemShape>",
            r#"<m:IndexedPageItemView MaxEntriesReturned="{}" Offset="{}" BasePoint="Beginning"/>"#,
            r#"<m:ParentFolderIds><t:DistinguishedFolderId Id="inbox"/></m:ParentFolderIds>"#,
            "</m:FindItem>"
        ),
        page_size, offset
    ))
}

/// Load the MIME content of one item
pub fn get_mime_content_request(item: &ItemId) -> String {
    envelope(&format!(
        concat!(
            "<m:GetItem>",
            "<m:ItemShape><t:BaseShape>IdOnly</t:BaseShape>",
            "<t:IncludeMimeContent>true</t:IncludeMimeContent></m:ItemShape>",
            "<m:ItemIds>{}</m:ItemIds>",
            "</m:GetItem>"
        ),
        item_id_element(item)
    ))
}

/// Set `IsRead` on one item; conflicting changes are auto-resolved
pub fn mark_read_request(item: &ItemId) -> String {
    envelope(&format!(
        concat!(
            r#"<m:UpdateItem MessageDisposition="SaveOnly" ConflictResolution="AutoResolve">"#,
            "<m:ItemChanges><t:ItemChange>{}<t:Updates><t:SetItemField>",
            r#"<t:FieldURI FieldURI="message:IsRead"/>"#,
            "<t:Message><t:IsRead>true</t:IsRead></t:Message>",
            "</t:SetItemField></t:Updates></t:ItemChange></m:ItemChanges>",
            "</m:UpdateItem>"
        ),
        item_id_element(item)
    ))
}

enum Node<'a> {
    Open(&'a BytesStart<'a>),
    Text(&'a str),
}

/// Walk `xml`, passing each element and text node with the local-name path
/// leading to it
///
/// Text is passed untrimmed and may arrive in several fragments, split
/// around entity references; visitors accumulate it per element.
fn walk<F>(xml: &str, mut visit: F) -> Result<()>
where
    F: FnMut(&[String], Node<'_>) -> Result<()>,
{
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event().context("Malformed EWS response")? {
            Event::Start(e) => {
                path.push(local_name(&e));
                visit(&path, Node::Open(&e))?;
            }
            Event::Empty(e) => {
                path.push(local_name(&e));
                visit(&path, Node::Open(&e))?;
                path.pop();
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Text(t) => {
                let text = String::from_utf8_lossy(&t);
                visit(&path, Node::Text(&text))?;
            }
            Event::GeneralRef(r) => {
                let text = resolve_reference(&r)?;
                visit(&path, Node::Text(&text))?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(())
}

/// Expand `&name;` or `&#N;` to its text; unknown entities are kept verbatim
fn resolve_reference(r: &BytesRef) -> Result<String> {
    if let Some(ch) = r
        .resolve_char_ref()
        .context("Invalid character reference in EWS response")?
    {
        return Ok(ch.to_string());
    }
    let name = r
        .decode()
        .context("Invalid entity reference in EWS response")?;
    Ok(match resolve_predefined_entity(&name) {
        Some(text) => text.to_string(),
        None => format!("&{};", name),
    })
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attr(e: &BytesStart, name: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.context("Invalid attribute in EWS response")?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .context("Invalid attribute value in EWS response")?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Element `depth` levels above the current one (0 = current)
fn ancestor(path: &[String], depth: usize) -> Option<&str> {
    path.len()
        .checked_sub(depth + 1)
        .map(|i| path[i].as_str())
}

/// Fail on SOAP faults and on response messages with `ResponseClass="Error"`
pub fn check_response(xml: &str) -> Result<()> {
    let mut failed = false;
    let mut message: Option<String> = None;
    let mut code: Option<String> = None;
    let mut fault: Option<String> = None;

    walk(xml, |path, node| {
        match node {
            Node::Open(e) => {
                if ancestor(path, 0).is_some_and(|name| name.ends_with("ResponseMessage"))
                    && attr(e, "ResponseClass")?.as_deref() == Some("Error")
                {
                    failed = true;
                }
            }
            Node::Text(text) => {
                let field = match ancestor(path, 0) {
                    Some("MessageText") => &mut message,
                    Some("ResponseCode") => &mut code,
                    Some("faultstring") => &mut fault,
                    _ => return Ok(()),
                };
                field.get_or_insert_with(String::new).push_str(text);
            }
        }
        Ok(())
    })?;

    if let Some(fault) = fault {
        bail!("SOAP fault: {}", fault.trim());
    }
    if failed {
        bail!(
            "{}: {}",
            code.as_deref().map(str::trim).unwrap_or("UnknownError"),
            message.as_deref().map(str::trim).unwrap_or("no message text")
        );
    }
    Ok(())
}

pub fn parse_get_folder(xml: &str) -> Result<FolderInfo> {
    check_response(xml)?;

    let mut info = FolderInfo::default();
    walk(xml, |path, node| {
        if let Node::Text(text) = node {
            match ancestor(path, 0) {
                Some("TotalCount") => {
                    info.total_count = text.trim().parse().context("Invalid TotalCount")?
                }
                Some("UnreadCount") => {
                    info.unread_count = text.trim().parse().context("Invalid UnreadCount")?
                }
                _ => {}
            }
        }
        Ok(())
    })?;

    Ok(info)
}

#[derive(Default)]
struct ListedItem {
    kind: String,
    id: Option<ItemId>,
    is_read: Option<bool>,
}

/// Parse a `FindItem` page, keeping only items that carry a read flag
pub fn parse_find_item(xml: &str) -> Result<Vec<SourceMessage>> {
    check_response(xml)?;

    let mut items: Vec<ListedItem> = Vec::new();
    walk(xml, |path, node| {
        match node {
            Node::Open(e) => {
                if ancestor(path, 1) == Some("Items") {
                    items.push(ListedItem {
                        kind: local_name(e),
                        ..ListedItem::default()
                    });
                } else if ancestor(path, 0) == Some("ItemId") && ancestor(path, 2) == Some("Items")
                {
                    if let (Some(item), Some(id)) = (items.last_mut(), attr(e, "Id")?) {
                        item.id = Some(ItemId {
                            id,
                            change_key: attr(e, "ChangeKey")?,
                        });
                    }
                }
            }
            Node::Text(text) => {
                if ancestor(path, 0) == Some("IsRead")
                    && ancestor(path, 2) == Some("Items")
                    && let Some(item) = items.last_mut()
                {
                    item.is_read = Some(matches!(text.trim(), "true" | "1"));
                }
            }
        }
        Ok(())
    })?;

    Ok(items
        .into_iter()
        .filter_map(|item| match (item.id, item.is_read) {
            (Some(id), Some(is_read)) => Some(SourceMessage::new(id, is_read)),
            (id, _) => {
                debug!("Ignoring {} item {:?}: not an e-mail message", item.kind, id);
                None
            }
        })
        .collect())
}

/// Parse a `GetItem` response and decode its MIME content
pub fn parse_get_item_mime(xml: &str) -> Result<Vec<u8>> {
    check_response(xml)?;

    let mut content: Option<String> = None;
    walk(xml, |path, node| {
        if let Node::Text(text) = node
            && ancestor(path, 0) == Some("MimeContent")
        {
            content.get_or_insert_with(String::new).push_str(text);
        }
        Ok(())
    })?;

    let content = content.context("GetItem response has no MimeContent")?;
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64_STANDARD
        .decode(compact)
        .context("MimeContent is not valid base64")
}

pub fn parse_update_item(xml: &str) -> Result<()> {
    check_response(xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="utf-8"?>"#,
                r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">"#,
                r#"<s:Header><h:ServerVersionInfo MajorVersion="14" MinorVersion="3""#,
                r#" xmlns:h="http://schemas.microsoft.com/exchange/services/2006/types"/></s:Header>"#,
                r#"<s:Body xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages""#,
                r#" xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types">"#,
                "{}</s:Body></s:Envelope>"
            ),
            body
        )
    }

    #[test]
    fn test_find_items_request() {
        let xml = find_items_request(100, 0);
        assert!(xml.contains(r#"MaxEntriesReturned="100""#));
        assert!(xml.contains(r#"Offset="0""#));
        assert!(xml.contains(r#"<t:DistinguishedFolderId Id="inbox"/>"#));
        assert!(xml.contains(r#"<t:RequestServerVersion Version="Exchange2010_SP2"/>"#));
    }

    #[test]
    fn test_mark_read_request_escapes_ids() {
        let item = ItemId::with_change_key("AAMk+a/b=", "CQAA\"x\"");
        let xml = mark_read_request(&item);
        assert!(xml.contains(r#"ConflictResolution="AutoResolve""#));
        assert!(xml.contains(r#"<t:ItemId Id="AAMk+a/b=" ChangeKey="CQAA&quot;x&quot;"/>"#));
        assert!(xml.contains("<t:IsRead>true</t:IsRead>"));
    }

    #[test]
    fn test_get_mime_content_request_without_change_key() {
        let xml = get_mime_content_request(&ItemId::new("AAMk1"));
        assert!(xml.contains(r#"<t:ItemId Id="AAMk1"/>"#));
        assert!(xml.contains("<t:IncludeMimeContent>true</t:IncludeMimeContent>"));
    }

    #[test]
    fn test_parse_get_folder() {
        let xml = response(concat!(
            "<m:GetFolderResponse><m:ResponseMessages>",
            r#"<m:GetFolderResponseMessage ResponseClass="Success">"#,
            "<m:ResponseCode>NoError</m:ResponseCode><m:Folders><t:Folder>",
            r#"<t:FolderId Id="AQMk" ChangeKey="AQAA"/>"#,
            "<t:DisplayName>Inbox</t:DisplayName>",
            "<t:TotalCount>42</t:TotalCount><t:ChildFolderCount>0</t:ChildFolderCount>",
            "<t:UnreadCount>3</t:UnreadCount>",
            "</t:Folder></m:Folders></m:GetFolderResponseMessage>",
            "</m:ResponseMessages></m:GetFolderResponse>"
        ));
        let info = parse_get_folder(&xml).unwrap();
        assert_eq!(
            info,
            FolderInfo {
                total_count: 42,
                unread_count: 3
            }
        );
    }

    #[test]
    fn test_parse_find_item() {
        let xml = response(concat!(
            "<m:FindItemResponse><m:ResponseMessages>",
            r#"<m:FindItemResponseMessage ResponseClass="Success">"#,
            "<m:ResponseCode>NoError</m:ResponseCode>",
            r#"<m:RootFolder IndexedPagingOffset="3" TotalItemsInView="3" IncludesLastItemInRange="true">"#,
            "<t:Items>",
            r#"<t:Message><t:ItemId Id="A" ChangeKey="ca"/><t:IsRead>false</t:IsRead></t:Message>"#,
            r#"<t:Message><t:ItemId Id="B" ChangeKey="cb"/><t:IsRead>true</t:IsRead></t:Message>"#,
            r#"<t:MeetingRequest><t:ItemId Id="C"/><t:IsRead>false</t:IsRead></t:MeetingRequest>"#,
            r#"<t:CalendarItem><t:ItemId Id="D"/></t:CalendarItem>"#,
            "</t:Items></m:RootFolder></m:FindItemResponseMessage>",
            "</m:ResponseMessages></m:FindItemResponse>"
        ));
        let items = parse_find_item(&xml).unwrap();
        assert_eq!(
            items,
            vec![
                SourceMessage::new(ItemId::with_change_key("A", "ca"), false),
                SourceMessage::new(ItemId::with_change_key("B", "cb"), true),
                SourceMessage::new(ItemId::new("C"), false),
            ]
        );
    }

    #[test]
    fn test_parse_find_item_empty_inbox() {
        let xml = response(concat!(
            "<m:FindItemResponse><m:ResponseMessages>",
            r#"<m:FindItemResponseMessage ResponseClass="Success">"#,
            "<m:ResponseCode>NoError</m:ResponseCode>",
            r#"<m:RootFolder TotalItemsInView="0" IncludesLastItemInRange="true"><t:Items/></m:RootFolder>"#,
            "</m:FindItemResponseMessage></m:ResponseMessages></m:FindItemResponse>"
        ));
        assert!(parse_find_item(&xml).unwrap().is_empty());
    }

    #[test]
    fn test_parse_get_item_mime() {
        let raw = b"Subject: Hello\r\n\r\nWorld\r\n";
        let xml = response(&format!(
            concat!(
                "<m:GetItemResponse><m:ResponseMessages>",
                r#"<m:GetItemResponseMessage ResponseClass="Success">"#,
                "<m:ResponseCode>NoError</m:ResponseCode><m:Items><t:Message>",
                r#"<t:MimeContent CharacterSet="UTF-8">{}</t:MimeContent>"#,
                r#"<t:ItemId Id="A" ChangeKey="ca"/>"#,
                "</t:Message></m:Items></m:GetItemResponseMessage>",
                "</m:ResponseMessages></m:GetItemResponse>"
            ),
            BASE64_STANDARD.encode(raw)
        ));
        assert_eq!(parse_get_item_mime(&xml).unwrap(), raw);
    }

    #[test]
    fn test_parse_get_item_without_mime_content() {
        let xml = response(concat!(
            "<m:GetItemResponse><m:ResponseMessages>",
            r#"<m:GetItemResponseMessage ResponseClass="Success">"#,
            "<m:ResponseCode>NoError</m:ResponseCode><m:Items><t:Message>",
            r#"<t:ItemId Id="A"/></t:Message></m:Items></m:GetItemResponseMessage>"#,
            "</m:ResponseMessages></m:GetItemResponse>"
        ));
        let err = parse_get_item_mime(&xml).unwrap_err();
        assert!(err.to_string().contains("no MimeContent"));
    }

    #[test]
    fn test_error_response_class() {
        let xml = response(concat!(
            "<m:UpdateItemResponse><m:ResponseMessages>",
            r#"<m:UpdateItemResponseMessage ResponseClass="Error">"#,
            "<m:MessageText>The specified object was not found in the store.</m:MessageText>",
            "<m:ResponseCode>ErrorItemNotFound</m:ResponseCode>",
            "<m:DescriptiveLinkKey>0</m:DescriptiveLinkKey>",
            "</m:UpdateItemResponseMessage></m:ResponseMessages></m:UpdateItemResponse>"
        ));
        let err = parse_update_item(&xml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ErrorItemNotFound: The specified object was not found in the store."
        );
    }

    #[test]
    fn test_soap_fault() {
        let xml = response(concat!(
            "<s:Fault><faultcode>a:ErrorSchemaValidation</faultcode>",
            "<faultstring>The request failed schema validation</faultstring></s:Fault>"
        ));
        let err = check_response(&xml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "SOAP fault: The request failed schema validation"
        );
    }

    #[test]
    fn test_error_text_with_entities() {
        let xml = response(concat!(
            "<m:GetFolderResponse><m:ResponseMessages>",
            r#"<m:GetFolderResponseMessage ResponseClass="Error">"#,
            "<m:MessageText>The account doesn&apos;t have permission &amp; access</m:MessageText>",
            "<m:ResponseCode>ErrorAccessDenied</m:ResponseCode>",
            "</m:GetFolderResponseMessage></m:ResponseMessages></m:GetFolderResponse>"
        ));
        let err = check_response(&xml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ErrorAccessDenied: The account doesn't have permission & access"
        );
    }

    #[test]
    fn test_soap_fault_with_entities() {
        let xml = response(concat!(
            "<s:Fault><faultcode>a:ErrorInvalidRequest</faultcode>",
            "<faultstring>Can&apos;t parse &lt;m:FindItem&gt; &#38; retry</faultstring></s:Fault>"
        ));
        let err = check_response(&xml).unwrap_err();
        assert_eq!(err.to_string(), "SOAP fault: Can't parse <m:FindItem> & retry");
    }

    #[test]
    fn test_pretty_printed_response() {
        let xml = response(concat!(
            "<m:GetFolderResponse>\n  <m:ResponseMessages>\n",
            "    <m:GetFolderResponseMessage ResponseClass=\"Success\">\n",
            "      <m:ResponseCode>NoError</m:ResponseCode>\n",
            "      <m:Folders><t:Folder>\n",
            "        <t:TotalCount> 7 </t:TotalCount>\n",
            "        <t:UnreadCount>2</t:UnreadCount>\n",
            "      </t:Folder></m:Folders>\n",
            "    </m:GetFolderResponseMessage>\n",
            "  </m:ResponseMessages>\n</m:GetFolderResponse>"
        ));
        assert_eq!(
            parse_get_folder(&xml).unwrap(),
            FolderInfo {
                total_count: 7,
                unread_count: 2
            }
        );
    }

    #[test]
    fn test_success_update() {
        let xml = response(concat!(
            "<m:UpdateItemResponse><m:ResponseMessages>",
            r#"<m:UpdateItemResponseMessage ResponseClass="Success">"#,
            "<m:ResponseCode>NoError</m:ResponseCode>",
            r#"<m:Items><t:Message><t:ItemId Id="A" ChangeKey="cb"/></t:Message></m:Items>"#,
            r#"<m:ConflictResults><t:Count>0</t:Count></m:ConflictResults>"#,
            "</m:UpdateItemResponseMessage></m:ResponseMessages></m:UpdateItemResponse>"
        ));
        assert!(parse_update_item(&xml).is_ok());
    }

    #[test]
    fn test_malformed_xml() {
        assert!(check_response("<a><b></a>").is_err());
    }
}
