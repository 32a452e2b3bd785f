use scraper::ElementRef;

use crate::match_record::League;

pub const DEFAULT_SEARCH_DEPTH: usize = 15;

/// Decides which competition a match found on the unified page belongs to.
pub trait LeagueClassifier: Send + Sync {
    fn classify(&self, anchor: ElementRef<'_>) -> Option<League>;
}

/// Walks backwards from the match through previous siblings, climbing to the
/// parent when siblings run out, and returns the first league heading seen.
/// Within one sibling block the heading nearest the match counts.
/// Parents only contribute their own text, never their descendants', so a
/// wrapper holding every section does not match the first league it contains.
///
/// This is a heuristic. A section without its own heading inherits whatever
/// heading precedes it in the document.
#[derive(Debug, Clone, Copy)]
pub struct DomWalkClassifier {
    max_depth: usize,
}

impl Default for DomWalkClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_DEPTH)
    }
}

impl DomWalkClassifier {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl LeagueClassifier for DomWalkClassifier {
    fn classify(&self, anchor: ElementRef<'_>) -> Option<League> {
        let mut current = *anchor;
        for _ in 0..self.max_depth {
            if let Some(sibling) = current.prev_sibling() {
                current = sibling;
                let text = match ElementRef::wrap(sibling) {
                    Some(element) => element.text().collect::<String>(),
                    None => sibling
                        .value()
                        .as_text()
                        .map(|t| t.to_string())
                        .unwrap_or_default(),
                };
                if let Some(league) = League::from_heading(&text) {
                    return Some(league);
                }
                continue;
            }

            let parent = current.parent()?;
            current = parent;
            if let Some(label) = ElementRef::wrap(parent)
                .and_then(|element| element.value().attr("aria-label"))
                .and_then(League::from_heading)
            {
                return Some(label);
            }
            let own_text: String = parent
                .children()
                .filter_map(|child| child.value().as_text().map(|t| t.to_string()))
                .collect();
            if let Some(league) = League::from_heading(&own_text) {
                return Some(league);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use scraper::{Html, Selector};

    use super::*;

    fn anchor_classify(html: &str, classifier: &DomWalkClassifier) -> Option<League> {
        let doc = Html::parse_document(html);
        let selector = Selector::parse("span.fixture").expect("selector");
        let anchor = doc.select(&selector).next().expect("anchor present");
        classifier.classify(anchor)
    }

    #[test]
    fn finds_heading_in_previous_sibling() {
        let html = r#"<div><h2>Scottish League One</h2><ul><li><span class="fixture">Alloa versus Cove Rangers kick off 15:00</span></li></ul></div>"#;
        // span -> li (no siblings) -> ul -> h2
        assert_eq!(
            anchor_classify(html, &DomWalkClassifier::default()),
            Some(League::ScottishLeagueOne)
        );
    }

    #[test]
    fn wrapper_text_of_later_sections_is_ignored() {
        let html = r#"<main>
            <section><h2>League Two</h2><p><span class="fixture">Bromley versus Walsall kick off 15:00</span></p></section>
            <section><h2>Premier League</h2><p>Arsenal versus Chelsea kick off 15:00</p></section>
        </main>"#;
        assert_eq!(
            anchor_classify(html, &DomWalkClassifier::default()),
            Some(League::LeagueTwo)
        );
    }

    #[test]
    fn depth_bound_stops_the_walk() {
        let html = r#"<div><h2>Premier League</h2><div><div><div><span class="fixture">Arsenal versus Chelsea kick off 15:00</span></div></div></div></div>"#;
        let shallow = DomWalkClassifier::new(2);
        assert_eq!(shallow.max_depth(), 2);
        assert_eq!(anchor_classify(html, &shallow), None);
        assert_eq!(
            anchor_classify(html, &DomWalkClassifier::new(10)),
            Some(League::PremierLeague)
        );
    }

    #[test]
    fn nearest_heading_in_a_sibling_block_wins() {
        let html = r#"<div>
            <div><h2>Premier League</h2><p>Arsenal versus Chelsea kick off 15:00</p><h2>League Two</h2></div>
            <p><span class="fixture">Bromley versus Walsall kick off 15:00</span></p>
        </div>"#;
        assert_eq!(
            anchor_classify(html, &DomWalkClassifier::default()),
            Some(League::LeagueTwo)
        );
    }

    #[test]
    fn aria_label_on_container_counts() {
        let html = r#"<section aria-label="National League"><span class="fixture">York City versus Altrincham kick off 15:00</span></section>"#;
        assert_eq!(
            anchor_classify(html, &DomWalkClassifier::default()),
            Some(League::NationalLeague)
        );
    }
}
