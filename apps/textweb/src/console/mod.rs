//! Interactive command loop over a [`TextPageRenderer`].

mod command;

pub(crate) use command::Command;
pub(crate) use command::ProxyCommand;
pub(crate) use command::parse;

use std::fmt::Write as _;
use std::io;
use std::io::BufRead;
use std::io::Write;
use tw_core::firewall::canonical_domain;
use tw_net::PageFetcher;
use tw_session::PageRenderer;
use tw_session::TextPageRenderer;
use tw_session::render::BANNER_WIDTH;
use tw_storage::VisitRecord;

const PROMPT: &str = "textweb> ";
const VISIT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

const HELP: &str = "\
Commands:
  open <url|text>         Navigate to a URL, or search for text
  <n> | follow <n>        Follow link or search result n
  back | forward          Move through history (re-fetches the page)
  reload                  Fetch the current page again
  history                 Show this session's history
  block <domain> [reason] Add a domain to the firewall
  unblock <domain>        Remove a domain from the firewall
  blocklist               Show blocked domains
  visits [limit]          Show recent visits with server addresses
  bookmark [title]        Bookmark the current page
  unbookmark              Remove the current page's bookmark
  bookmarks               List bookmarks
  proxy on|off|status     Route traffic through the SOCKS5 proxy
  engine <name>           Set the default search engine (google, duckduckgo)
  help                    Show this help
  exit | quit             Leave";

pub(crate) struct Console<F: PageFetcher> {
    renderer: TextPageRenderer<F>,
}

impl<F: PageFetcher> Console<F> {
    pub(crate) fn new(renderer: TextPageRenderer<F>) -> Self {
        Self { renderer }
    }

    pub(crate) fn run<R, W>(&mut self, input: R, mut output: W, start: Option<&str>) -> io::Result<()>
    where
        R: BufRead,
        W: Write,
    {
        writeln!(output, "{}", self.banner())?;
        if let Some(start) = start {
            writeln!(output, "{}", self.renderer.load(start))?;
        }

        let mut lines = input.lines();
        loop {
            write!(output, "\n{PROMPT}")?;
            output.flush()?;

            let Some(line) = lines.next() else {
                writeln!(output)?;
                break;
            };

            match parse(&line?) {
                Ok(Command::Exit) => break,
                Ok(Command::Empty) => {}
                Ok(command) => writeln!(output, "{}", self.execute(command))?,
                Err(error) => writeln!(output, "{error}")?,
            }
        }

        writeln!(output, "Browser closed. Goodbye!")?;
        output.flush()
    }

    fn banner(&self) -> String {
        let session = self.renderer.session();
        let rule = "=".repeat(BANNER_WIDTH);
        let mut banner = format!(
            "{rule}\n{:=^width$}\n{rule}\n{HELP}\n",
            " TEXTWEB ",
            width = BANNER_WIDTH
        );
        let _ = write!(
            banner,
            "\nDefault search is {}",
            session.effective_search_engine()
        );
        if session.proxy_enabled() {
            let _ = write!(banner, " (proxy {} enabled)", session.proxy());
        }
        banner.push('\n');
        banner.push_str(&rule);
        banner
    }

    pub(crate) fn execute(&mut self, command: Command) -> String {
        match command {
            Command::Empty | Command::Exit => String::new(),
            Command::Open(target) => self.renderer.load(&target),
            Command::Follow(id) => self.renderer.follow(id),
            Command::Back => self.renderer.back(),
            Command::Forward => self.renderer.forward(),
            Command::Reload => self.renderer.reload(),
            Command::History => self.history(),
            Command::Block { domain, reason } => self.block(&domain, reason.as_deref()),
            Command::Unblock(domain) => self.unblock(&domain),
            Command::Blocklist => self.blocklist(),
            Command::Visits(limit) => self.visits(limit),
            Command::Bookmark(title) => self.bookmark(title.as_deref()),
            Command::Unbookmark => self.unbookmark(),
            Command::Bookmarks => self.bookmarks(),
            Command::Proxy(action) => self.proxy(action),
            Command::Engine(engine) => {
                let session = self.renderer.session_mut();
                session.set_search_engine(engine);
                if session.proxy_enabled() {
                    format!("Default search engine set to {engine} (DuckDuckGo is used while the proxy is on)")
                } else {
                    format!("Default search engine set to {engine}")
                }
            }
            Command::Help => HELP.to_owned(),
        }
    }

    fn history(&self) -> String {
        let history = self.renderer.session().history();
        if history.is_empty() {
            return "No browsing history".to_owned();
        }

        let mut out = String::from("--- Browsing History ---");
        for (index, entry) in history.entries().iter().enumerate() {
            let marker = if history.cursor() == Some(index) {
                " <- current"
            } else {
                ""
            };
            let _ = write!(out, "\n{}. {}{marker}", index + 1, entry.location);
        }
        out
    }

    fn block(&self, domain: &str, reason: Option<&str>) -> String {
        let Some(domain) = canonical_domain(domain) else {
            return "Invalid domain format".to_owned();
        };

        if self.renderer.session().store().block(&domain, reason) {
            format!("Domain '{domain}' has been blocked")
        } else {
            format!("Failed to block domain '{domain}'")
        }
    }

    fn unblock(&self, domain: &str) -> String {
        let Some(domain) = canonical_domain(domain) else {
            return "Invalid domain format".to_owned();
        };

        if self.renderer.session().store().unblock(&domain) {
            format!("Domain '{domain}' has been unblocked")
        } else {
            format!("Failed to unblock domain '{domain}' or domain not in blocklist")
        }
    }

    fn blocklist(&self) -> String {
        let rules = self.renderer.session().store().block_rules();
        if rules.is_empty() {
            return "No domains are currently blocked".to_owned();
        }

        let mut out = String::from("--- Blocked Domains ---");
        for (index, rule) in rules.iter().enumerate() {
            let _ = write!(out, "\n{}. {}", index + 1, rule.domain);
            if let Some(reason) = &rule.reason {
                let _ = write!(out, " ({reason})");
            }
        }
        out
    }

    fn visits(&self, limit: usize) -> String {
        let visits = self.renderer.session().store().recent_visits(limit);
        if visits.is_empty() {
            return "No visit history available".to_owned();
        }

        let mut out = String::from("--- Recent Website Visits ---");
        for (index, visit) in visits.iter().enumerate() {
            out.push('\n');
            out.push_str(&format_visit(index + 1, visit));
        }
        out
    }

    fn bookmark(&self, title: Option<&str>) -> String {
        let session = self.renderer.session();
        let Some(location) = session.current_location() else {
            return "No page loaded yet".to_owned();
        };

        let title = title
            .or_else(|| session.current_content().and_then(|content| content.title()))
            .unwrap_or(location.domain());
        if session.store().add_bookmark(location.as_str(), Some(title)) {
            format!("Bookmarked {location} as '{title}'")
        } else {
            format!("Bookmark for {location} was not saved")
        }
    }

    fn unbookmark(&self) -> String {
        let session = self.renderer.session();
        let Some(location) = session.current_location() else {
            return "No page loaded yet".to_owned();
        };

        if session.store().remove_bookmark(location.as_str()) {
            format!("Removed bookmark for {location}")
        } else {
            format!("{location} is not bookmarked")
        }
    }

    fn bookmarks(&self) -> String {
        let bookmarks = self.renderer.session().store().bookmarks();
        if bookmarks.is_empty() {
            return "No bookmarks saved".to_owned();
        }

        let mut out = String::from("--- Bookmarks ---");
        for (index, bookmark) in bookmarks.iter().enumerate() {
            let title = bookmark.title.as_deref().unwrap_or("Untitled");
            let _ = write!(out, "\n{}. {title}\n   {}", index + 1, bookmark.url);
        }
        out
    }

    fn proxy(&mut self, action: ProxyCommand) -> String {
        let session = self.renderer.session_mut();
        match action {
            ProxyCommand::Status => {
                format!("Proxy {}: {}", session.proxy(), session.proxy_status().as_str())
            }
            ProxyCommand::On => match session.set_proxy(true) {
                Ok(()) => {
                    let mut out = format!(
                        "Proxy enabled via {}; searches now use DuckDuckGo",
                        session.proxy()
                    );
                    if session.proxy_status() == tw_session::ProxyStatus::NotRunning {
                        out.push_str("\nWarning: nothing is listening on the proxy port");
                    }
                    out
                }
                Err(error) => format!("Error: {error}"),
            },
            ProxyCommand::Off => match session.set_proxy(false) {
                Ok(()) => "Proxy disabled; connecting directly".to_owned(),
                Err(error) => format!("Error: {error}"),
            },
        }
    }
}

pub(crate) fn format_visit(number: usize, visit: &VisitRecord) -> String {
    let title = visit.title.as_deref().unwrap_or("No title");
    format!(
        "{number}. {title}\n   URL: {}\n   IP Address: {}\n   Location: {}\n   Time: {}\n",
        visit.url,
        visit.ip_address,
        visit.location,
        visit.visited_at.format(VISIT_TIME_FORMAT)
    )
}
