use crate::domain::{CategoryMode, Category, LineItem};
use once_cell::sync::Lazy;
use regex::Regex;

const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Food,
        &[
            "món", "lẩu", "gà", "bò", "heo", "cá", "cua", "mực", "tôm", "ghẹ", "sò", "gỏi", "xào",
            "nướng", "chiên", "hấp", "hầm", "quay", "cơm", "xôi", "soup", "trà", "cà phê", "nước",
            "coca", "matcha", "oolong", "trái cây", "bánh", "đậu", "trứng", "lươn", "hàu",
            "khô mực", "khăn lạnh", "hủ tiếu", "baba", "bồ câu", "chả", "dừa", "khoáng", "suối",
            "sả", "rượu", "coffee", "cafe", "katinat", "highlands", "starbucks", "phúc long",
            "trung nguyên", "golden gate", "pizza", "kfc", "lotteria", "jollibee", "mcdonald",
            "domino", "xa lach rau mam", "buffet",
        ],
    ),
    (
        Category::Lodging,
        &[
            "thuê phòng", "phòng số", "cho thuê phòng", "phòng họp", "meeting room", "hotel",
            "khách sạn", "homestay", "resort",
        ],
    ),
    (Category::Flowers, &["hoa tươi", "hoa", "bó hoa", "lãng hoa", "kệ hoa"]),
    (
        Category::PhoneCard,
        &[
            "cước", "di động", "thẻ cào", "sim", "điện thoại", "internet", "mạng", "mệnh giá",
            "the cao menh gia", "viettel", "mobifone", "vinaphone",
        ],
    ),
    (
        Category::Fuel,
        &["xăng", "dầu", "diesel", "ron95", "ron92", "e5", "do 0.05s", "petrolimex"],
    ),
    (Category::Gift, &["quà", "gift", "quà tặng", "tặng phẩm"]),
];

const FB_BRANDS: &[&str] = &[
    "KATINAT", "HIGHLANDS", "STARBUCKS", "PHÚC LONG", "COFFEE HOUSE", "TRUNG NGUYÊN",
    "GOLDEN GATE", "PIZZA", "KFC", "LOTTERIA", "JOLLIBEE", "MCDONALD", "DOMINO",
];

enum Matcher {
    Word(Regex),
    Substring(&'static str),
}

impl Matcher {
    fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::Word(re) => re.is_match(text),
            Matcher::Substring(kw) => text.contains(kw),
        }
    }
}

// Fuel keywords match as substrings: OCR tends to glue them ("XăngRON95").
static MATCHERS: Lazy<Vec<(Category, Vec<Matcher>)>> = Lazy::new(|| {
    CATEGORY_KEYWORDS
        .iter()
        .map(|(category, keywords)| {
            let matchers = keywords
                .iter()
                .map(|kw| {
                    if *category == Category::Fuel {
                        Matcher::Substring(kw)
                    } else {
                        let pattern = format!(r"\b{}\b", regex::escape(kw));
                        Matcher::Word(Regex::new(&pattern).expect("keyword pattern is valid"))
                    }
                })
                .collect();
            (category.clone(), matchers)
        })
        .collect()
});

/// Scores item text against the keyword table; F&B brands in the seller name win outright.
pub fn classify_content(services_text: &str, seller_name: &str) -> Category {
    let seller_upper = seller_name.to_uppercase();
    if !seller_upper.is_empty() && FB_BRANDS.iter().any(|brand| seller_upper.contains(brand)) {
        return Category::Food;
    }

    if services_text.trim().is_empty() {
        return Category::Other;
    }
    let text = services_text.to_lowercase();

    let mut best: Option<(&Category, usize)> = None;
    for (category, matchers) in MATCHERS.iter() {
        let score = matchers.iter().filter(|m| m.is_match(&text)).count();
        if score > 0 && best.map_or(true, |(_, top)| score > top) {
            best = Some((category, score));
        }
    }

    best.map(|(category, _)| category.clone())
        .unwrap_or(Category::Other)
}

/// Coarse category for scanned invoices, decided from the whole OCR text.
pub fn classify_ocr_text(text: &str) -> Category {
    let lower = text.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has_any(&["petrolimex", "xăng", "ron 95", "ron95", "diesel", "dầu diesel"]) {
        Category::Fuel
    } else if has_any(&["khách sạn", "hotel", "phòng nghỉ"]) {
        Category::Lodging
    } else if has_any(&["nhà hàng", "quán ăn", "món ăn"]) {
        Category::Food
    } else {
        Category::Other
    }
}

/// Final category for an invoice.
///
/// In auto mode a category already detected during extraction wins unless it is
/// `Khác`; otherwise item names and the seller are scored.
pub fn choose_category(
    mode: &CategoryMode,
    detected: Option<&Category>,
    items: &[LineItem],
    seller: &str,
) -> Category {
    match mode {
        CategoryMode::Fixed(category) => category.clone(),
        CategoryMode::Auto => match detected {
            Some(category) if *category != Category::Other => category.clone(),
            _ => {
                let names = items
                    .iter()
                    .map(|item| item.name.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                classify_content(&names, seller)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str) -> LineItem {
        LineItem {
            name: name.to_string(),
            quantity: "1".to_string(),
            unit_price: "100,000".to_string(),
            amount: "100,000".to_string(),
            tax_rate: None,
        }
    }

    #[test]
    fn test_brand_in_seller_wins() {
        assert_eq!(
            classify_content("Thuê phòng họp", "CÔNG TY CP KATINAT SAIGON"),
            Category::Food
        );
    }

    #[test]
    fn test_keyword_scoring() {
        assert_eq!(classify_content("Lẩu gà lá é Cơm chiên", ""), Category::Food);
        assert_eq!(classify_content("Thuê phòng khách sạn 2 đêm", ""), Category::Lodging);
        assert_eq!(classify_content("Thẻ cào mệnh giá Viettel", ""), Category::PhoneCard);
        assert_eq!(classify_content("Văn phòng phẩm", ""), Category::Other);
        assert_eq!(classify_content("", ""), Category::Other);
    }

    #[test]
    fn test_word_boundary_avoids_partial_match() {
        // "thấp" must not count as "hấp"
        assert_eq!(classify_content("Bàn thấp", ""), Category::Other);
    }

    #[test]
    fn test_fuel_uses_substring() {
        assert_eq!(classify_content("XăngRON95-III", ""), Category::Fuel);
    }

    #[test]
    fn test_ocr_classification() {
        assert_eq!(classify_ocr_text("PETROLIMEX cửa hàng 12"), Category::Fuel);
        assert_eq!(classify_ocr_text("Hotel Majestic"), Category::Lodging);
        assert_eq!(classify_ocr_text("Nhà hàng Ngon"), Category::Food);
        assert_eq!(classify_ocr_text("Văn phòng phẩm"), Category::Other);
    }

    #[test]
    fn test_choose_category_modes() {
        let items = vec![item("Hoa tươi bó lớn")];
        let fixed = CategoryMode::Fixed(Category::Gift);
        assert_eq!(choose_category(&fixed, None, &items, ""), Category::Gift);

        let custom = CategoryMode::parse("Văn phòng phẩm");
        assert_eq!(
            choose_category(&custom, None, &items, ""),
            Category::Custom("Văn phòng phẩm".to_string())
        );

        assert_eq!(
            choose_category(&CategoryMode::Auto, Some(&Category::Fuel), &items, ""),
            Category::Fuel
        );
        assert_eq!(
            choose_category(&CategoryMode::Auto, Some(&Category::Other), &items, ""),
            Category::Flowers
        );
        assert_eq!(
            choose_category(&CategoryMode::Auto, None, &[], "HIGHLANDS COFFEE"),
            Category::Food
        );
    }
}
