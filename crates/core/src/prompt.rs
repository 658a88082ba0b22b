//! Natural-language brief for the site generator.

pub const DEFAULT_SNAPSHOT_BUDGET: usize = 2000;

#[derive(Debug, Clone)]
pub struct PromptSpec {
    pub company: String,
    pub products: Vec<String>,
    pub palette: String,
    pub accent: String,
    /// File name the page should `fetch` for live data.
    pub snapshot_file: String,
    /// Maximum characters of snapshot JSON inlined into the prompt.
    pub snapshot_budget: usize,
}

impl Default for PromptSpec {
    fn default() -> Self {
        Self {
            company: "Primate".to_string(),
            products: vec!["Tripper".to_string(), "Camper".to_string()],
            palette: "grey, black, white, and light blue".to_string(),
            accent: "#3498db".to_string(),
            snapshot_file: "kraken.json".to_string(),
            snapshot_budget: DEFAULT_SNAPSHOT_BUDGET,
        }
    }
}

/// Per-invocation inputs. `snapshot_json` is the raw file content.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptInput<'a> {
    pub snapshot_json: Option<&'a str>,
    pub lightness: Option<u32>,
}

impl PromptSpec {
    pub fn build(&self, input: PromptInput<'_>) -> String {
        let products = self
            .products
            .iter()
            .map(|p| format!("\"{p}\""))
            .collect::<Vec<_>>()
            .join(" and ");
        let product_menu = self.products.join(" and ");

        let mut out = String::new();
        out.push_str(&format!(
            "Create a professional, responsive HTML website for a company called \"{}\" that has {} automated trading system products: {}.\n\n",
            self.company,
            number_word(self.products.len()),
            products
        ));

        if let Some(json) = input.snapshot_json {
            let (head, truncated) = truncate_chars(json, self.snapshot_budget);
            out.push_str("CRITICAL REQUIREMENT:\n");
            out.push_str("- This website must display real trading data from the Kraken Futures API\n");
            out.push_str(&format!(
                "- The data is available in a file called '{}' in the same directory\n",
                self.snapshot_file
            ));
            out.push_str("- The JSON data structure includes: accounts, open_positions, recent_orders, open_orders, fills\n");
            out.push_str("- Create comprehensive visualizations and displays for this trading data\n\n");
            out.push_str("KRAKEN DATA STRUCTURE (for reference):\n");
            out.push_str(head);
            if truncated {
                out.push_str("... [truncated]");
            }
            out.push_str("\n\n");
        }

        out.push_str("Website Requirements:\n");
        out.push_str(&format!(
            "- Professional, modern UI with {} color scheme\n",
            self.palette
        ));
        out.push_str("- Fully responsive and mobile-friendly\n");
        if input.snapshot_json.is_some() {
            out.push_str(&format!(
                "- Dropdown navigation menu with options: Home, Products (with {product_menu} dropdown), Trading Dashboard, About, Contact\n"
            ));
            out.push_str("- Under the Trading Dashboard, display the account data including:\n");
            out.push_str("    * Account balances and equity\n");
            out.push_str("    * Open positions with current P/L\n");
            out.push_str("    * Recent order history\n");
            out.push_str("    * Open orders\n");
            out.push_str("    * Recent trade fills\n");
            out.push_str("    * Performance charts and metrics\n");
            out.push_str(&format!(
                "- Include sections for both {product_menu} with their descriptions\n"
            ));
            out.push_str("- Contact page/form\n");
            out.push_str("- Use the actual Kraken data for all trading displays\n\n");
        } else {
            out.push_str(&format!(
                "- Dropdown navigation menu with options: Home, Products (with {product_menu} dropdown), About, Contact\n"
            ));
            if let Some(first) = self.products.first() {
                out.push_str(&format!(
                    "- Under the {first} tab, show performance over time with mock data (charts/graphs showing ROI progression)\n"
                ));
            }
            out.push_str("- Include sections for both products with their descriptions\n");
            out.push_str("- Contact page/form\n");
            out.push_str("- Use mock performance data for demonstration\n\n");
        }

        out.push_str("Design specifications:\n");
        out.push_str(&format!(
            "- Color scheme: {} ({} or similar)\n",
            self.palette, self.accent
        ));
        out.push_str("- Professional financial/trading company aesthetic\n");
        out.push_str("- Clean, modern typography\n");
        out.push_str("- Responsive grid layout\n");
        out.push_str("- Include interactive elements for the performance charts\n");
        if let Some(level) = input.lightness {
            out.push_str(&format!(
                "- Lightness level: {level} on a scale of 0 (darkest) to 59 (lightest). Tune background and surface shades to match this level while keeping text readable\n"
            ));
        }
        out.push('\n');

        if input.snapshot_json.is_some() {
            out.push_str(&format!(
                "IMPORTANT: The HTML should be designed to read and display data from '{}'.\n",
                self.snapshot_file
            ));
            out.push_str("Use JavaScript to fetch and parse the JSON file and update the dashboard displays.\n\n");
        }

        out.push_str("Please output ONLY the HTML code with embedded CSS and JavaScript, no explanations or markdown formatting.\n");
        out.push_str("Return complete, valid HTML5 document.\n");
        out
    }
}

/// Cut `s` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> (&str, bool) {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => (&s[..idx], true),
        None => (s, false),
    }
}

fn number_word(n: usize) -> String {
    match n {
        1 => "one".to_string(),
        2 => "two".to_string(),
        3 => "three".to_string(),
        n => n.to_string(),
    }
}
