use serde::Serialize;

const SOURCE_SEPARATOR: &str = "$$$";
const ENTRY_SEPARATOR: char = '#';
const URL_SEPARATOR: char = '$';

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedPlayUrl {
    pub source: String,
    pub season_title: String,
    pub title: String,
    pub original_title: String,
    pub url: String,
}

pub fn parse_play_url(
    season_title: &str,
    source_names: &str,
    play_blocks: &str,
) -> Vec<ParsedPlayUrl> {
    if play_blocks.is_empty() {
        return Vec::new();
    }

    let sources = source_names.split(SOURCE_SEPARATOR).collect::<Vec<_>>();

    let mut out = Vec::new();
    for (index, block) in play_blocks.split(SOURCE_SEPARATOR).enumerate() {
        let source = sources
            .get(index)
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string())
            .unwrap_or_else(|| format!("source_{index}"));

        for entry in block.split(ENTRY_SEPARATOR).filter(|entry| !entry.is_empty()) {
            let Some((original_title, url)) = entry.split_once(URL_SEPARATOR) else {
                continue;
            };
            out.push(ParsedPlayUrl {
                source: source.clone(),
                season_title: season_title.to_string(),
                title: format!("{season_title} - {source} - {original_title}"),
                original_title: original_title.to_string(),
                url: url.to_string(),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_sources_with_blocks_by_position() {
        let parsed = parse_play_url("Show", "A$$$B", "Ep1$u1#Ep2$u2$$$Ep3$u3");
        assert_eq!(parsed.len(), 3);
        assert_eq!(
            parsed.iter().map(|item| item.source.as_str()).collect::<Vec<_>>(),
            vec!["A", "A", "B"]
        );
        assert_eq!(parsed[0].original_title, "Ep1");
        assert_eq!(parsed[0].url, "u1");
        assert_eq!(parsed[1].url, "u2");
        assert_eq!(parsed[2].original_title, "Ep3");
        assert_eq!(parsed[2].url, "u3");
        assert_eq!(parsed[2].title, "Show - B - Ep3");
        assert_eq!(parsed[2].season_title, "Show");
    }

    #[test]
    fn empty_input_yields_no_entries() {
        assert!(parse_play_url("Show", "", "").is_empty());
    }

    #[test]
    fn missing_source_names_fall_back_to_index_labels() {
        let parsed = parse_play_url("Show", "A", "Ep1$u1$$$Ep2$u2");
        assert_eq!(parsed[0].source, "A");
        assert_eq!(parsed[1].source, "source_1");
        assert_eq!(parsed[1].title, "Show - source_1 - Ep2");
    }

    #[test]
    fn splits_entry_on_first_dollar_only_and_drops_entries_without_url() {
        let parsed = parse_play_url("Show", "A", "Ep1$https://x/play?a=$b##NoUrl#Ep2$u2");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].url, "https://x/play?a=$b");
        assert_eq!(parsed[1].original_title, "Ep2");
    }
}
