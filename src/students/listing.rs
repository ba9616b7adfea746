//! Strand listings: one parametrized view over the enrolled-student snapshot.
//!
//! A view fetches every enrolled student of its scope, sorts by name, groups by strand and
//! keeps the bucket it is configured for. The search query is applied last, over the
//! `"last, first middle"` display name.

use std::{cmp::Ordering, collections::BTreeMap, sync::Arc};

use serde::Serialize;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use super::{
    repo::StudentStore,
    repo_types::{EnrollmentStatus, Student, Track},
};
use crate::error::StoreError;

/// Bucket for students without a strand.
pub const UNKNOWN_STRAND: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingView {
    pub slug: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    /// Table the view reads from.
    pub scope: Track,
    /// Strand bucket to show; `None` shows the whole sorted scope.
    pub group_key: Option<&'static str>,
}

pub const VIEWS: &[ListingView] = &[
    ListingView {
        slug: "humss",
        title: "HUMSS Students",
        description: "Humanities and Social Sciences Strand",
        scope: Track::General,
        group_key: Some("HUMSS"),
    },
    ListingView {
        slug: "abm",
        title: "ABM Students",
        description: "Accountancy, Business and Management Strand",
        scope: Track::General,
        group_key: Some("ABM"),
    },
    ListingView {
        slug: "tvl-ict",
        title: "TVL-ICT Students",
        description: "Technical-Vocational-Livelihood, Information and Communications Technology",
        scope: Track::General,
        group_key: Some("TVL-ICT"),
    },
    ListingView {
        slug: "stem",
        title: "STEM Students",
        description: "Science, Technology, Engineering and Mathematics Strand",
        scope: Track::General,
        group_key: Some("STEM"),
    },
    ListingView {
        slug: "als",
        title: "ALS Students",
        description: "Alternative Learning System",
        scope: Track::Als,
        group_key: None,
    },
];

impl ListingView {
    pub fn by_slug(slug: &str) -> Option<&'static ListingView> {
        VIEWS.iter().find(|v| v.slug.eq_ignore_ascii_case(slug))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingRow {
    /// 1-based position in the filtered list.
    pub index: usize,
    pub lrn: String,
    pub display_name: String,
    pub four_ps: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingPage {
    pub view: &'static str,
    pub title: &'static str,
    pub query: String,
    /// Students in the bucket before the query is applied.
    pub total: usize,
    pub rows: Vec<ListingRow>,
}

/// Base letters only: decomposed, accents dropped, lowercased. "Ábalos" keys as "abalos".
fn collation_key(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect::<String>().to_lowercase()
}

/// Base letters first; accents and case only break ties.
fn collate(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
}

/// Last name, then first name, middle name and LRN so equal last names have a fixed order.
pub fn compare_students(a: &Student, b: &Student) -> Ordering {
    collate(&a.lname, &b.lname)
        .then_with(|| collate(&a.fname, &b.fname))
        .then_with(|| collate(&a.mname, &b.mname))
        .then_with(|| a.lrn.cmp(&b.lrn))
}

pub fn strand_label(s: &Student) -> &str {
    s.strand
        .as_deref()
        .map(str::trim)
        .filter(|st| !st.is_empty())
        .unwrap_or(UNKNOWN_STRAND)
}

/// Groups an already sorted list; each bucket keeps the input order.
pub fn group_by_strand(students: Vec<Student>) -> BTreeMap<String, Vec<Student>> {
    let mut groups: BTreeMap<String, Vec<Student>> = BTreeMap::new();
    for s in students {
        groups.entry(strand_label(&s).to_string()).or_default().push(s);
    }
    groups
}

/// `"last, first middle"` as searched. Keeps the trailing space of an empty middle name.
fn search_text(s: &Student) -> String {
    format!("{}, {} {}", s.lname, s.fname, s.mname)
}

pub fn display_name(s: &Student) -> String {
    search_text(s).trim_end().to_string()
}

pub fn matches_query(s: &Student, query: &str) -> bool {
    search_text(s)
        .to_lowercase()
        .contains(&query.to_lowercase())
}

pub fn filter_students<'a>(students: &'a [Student], query: &str) -> Vec<&'a Student> {
    students.iter().filter(|s| matches_query(s, query)).collect()
}

/// Sort, group and pick the view's bucket from a fetched snapshot.
pub fn select_bucket(view: &ListingView, mut students: Vec<Student>) -> Vec<Student> {
    students.retain(|s| s.enrollment_status == EnrollmentStatus::Enrolled);
    students.sort_by(compare_students);
    match view.group_key {
        Some(key) => group_by_strand(students).remove(key).unwrap_or_default(),
        None => students,
    }
}

pub fn build_page(view: &'static ListingView, students: Vec<Student>, query: &str) -> ListingPage {
    let bucket = select_bucket(view, students);
    let rows = filter_students(&bucket, query)
        .into_iter()
        .enumerate()
        .map(|(i, s)| ListingRow {
            index: i + 1,
            lrn: s.lrn.clone(),
            display_name: display_name(s),
            four_ps: s.four_ps.clone().unwrap_or_else(|| "No".to_string()),
        })
        .collect();
    ListingPage {
        view: view.slug,
        title: view.title,
        query: query.to_string(),
        total: bucket.len(),
        rows,
    }
}

/// A configured view bound to the store it fetches from.
#[derive(Clone)]
pub struct StudentListing {
    view: &'static ListingView,
    store: Arc<dyn StudentStore>,
}

impl StudentListing {
    pub fn new(view: &'static ListingView, store: Arc<dyn StudentStore>) -> Self {
        Self { view, store }
    }

    pub fn view(&self) -> &'static ListingView {
        self.view
    }

    pub async fn render(&self, query: &str) -> Result<ListingPage, StoreError> {
        let students = self.store.list_enrolled(self.view.scope, None).await?;
        Ok(build_page(self.view, students, query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::students::{memory::MemoryStudentStore, repo_types::ALS_STRAND};

    fn student(lrn: &str, lname: &str, fname: &str, strand: Option<&str>, enrolled: bool) -> Student {
        Student {
            lrn: lrn.into(),
            lname: lname.into(),
            fname: fname.into(),
            mname: String::new(),
            strand: strand.map(Into::into),
            enrollment_status: if enrolled {
                EnrollmentStatus::Enrolled
            } else {
                EnrollmentStatus::Pending
            },
            four_ps: None,
        }
    }

    fn view(slug: &str) -> &'static ListingView {
        ListingView::by_slug(slug).expect("configured view")
    }

    #[test]
    fn stem_and_abm_scenario() {
        let snapshot = vec![
            student("1", "Cruz", "Ana", Some("STEM"), true),
            student("2", "Bravo", "Leo", Some("ABM"), false),
        ];

        let stem = build_page(view("stem"), snapshot.clone(), "");
        assert_eq!(stem.rows.len(), 1);
        assert_eq!(stem.rows[0].display_name, "Cruz, Ana");

        let abm = build_page(view("abm"), snapshot, "");
        assert!(abm.rows.is_empty());
        assert_eq!(abm.total, 0);
    }

    #[test]
    fn blank_and_missing_strands_group_as_unknown() {
        let groups = group_by_strand(vec![
            student("1", "A", "A", None, true),
            student("2", "B", "B", Some("  "), true),
            student("3", "C", "C", Some("STEM"), true),
        ]);
        assert_eq!(groups[UNKNOWN_STRAND].len(), 2);
        assert_eq!(groups["STEM"].len(), 1);

        for v in VIEWS.iter().filter(|v| v.group_key.is_some()) {
            let page = build_page(v, vec![student("1", "A", "A", None, true)], "");
            assert!(page.rows.is_empty(), "{} showed an unknown-strand student", v.slug);
        }
    }

    #[test]
    fn query_is_case_insensitive_substring_of_display_name() {
        let mut doe = student("1", "Doe", "John", Some("STEM"), true);
        doe.mname = "A".into();
        assert_eq!(display_name(&doe), "Doe, John A");
        assert!(matches_query(&doe, "doe"));
        assert!(matches_query(&doe, "E, JO"));
        assert!(matches_query(&doe, "john a"));
        assert!(!matches_query(&doe, "jane"));
    }

    #[test]
    fn query_sees_the_space_after_a_first_name() {
        let cruz = student("1", "Cruz", "Ana", Some("STEM"), true);
        assert_eq!(display_name(&cruz), "Cruz, Ana");
        assert!(matches_query(&cruz, "ana "));
        assert!(matches_query(&cruz, "CRUZ, ANA "));
        assert!(!matches_query(&cruz, "ana  "));

        let page = build_page(view("stem"), vec![cruz], "ana ");
        assert_eq!(page.rows.len(), 1);
    }

    #[test]
    fn filtering_twice_changes_nothing() {
        let list = vec![
            student("1", "Doe", "John", Some("STEM"), true),
            student("2", "Roe", "Jane", Some("STEM"), true),
            student("3", "Poe", "Ed", Some("STEM"), true),
        ];
        let once: Vec<Student> = filter_students(&list, "oe, j").into_iter().cloned().collect();
        let twice: Vec<Student> = filter_students(&once, "oe, j").into_iter().cloned().collect();
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn equal_last_names_order_by_first_name() {
        let page = build_page(
            view("stem"),
            vec![
                student("8", "cruz", "Maria", Some("STEM"), true),
                student("9", "Cruz", "Ana", Some("STEM"), true),
                student("7", "Abad", "Zed", Some("STEM"), true),
            ],
            "",
        );
        let names: Vec<_> = page.rows.iter().map(|r| r.display_name.as_str()).collect();
        assert_eq!(names, ["Abad, Zed", "Cruz, Ana", "cruz, Maria"]);
        assert_eq!(
            page.rows.iter().map(|r| r.index).collect::<Vec<_>>(),
            [1, 2, 3]
        );
    }

    #[test]
    fn accented_last_names_sort_with_their_base_letters() {
        let page = build_page(
            view("stem"),
            vec![
                student("1", "Zamora", "Kai", Some("STEM"), true),
                student("2", "Muzon", "Lea", Some("STEM"), true),
                student("3", "Ábalos", "Rey", Some("STEM"), true),
                student("4", "Muñoz", "Ivy", Some("STEM"), true),
            ],
            "",
        );
        let names: Vec<_> = page.rows.iter().map(|r| r.display_name.as_str()).collect();
        assert_eq!(names, ["Ábalos, Rey", "Muñoz, Ivy", "Muzon, Lea", "Zamora, Kai"]);
    }

    #[test]
    fn accent_only_breaks_ties() {
        assert_eq!(collate("Peña", "Pena"), Ordering::Greater);
        assert_eq!(collate("Peña", "Penz"), Ordering::Less);
        assert_eq!(collate("ábalos", "Ábalos"), Ordering::Equal);
    }

    #[test]
    fn index_follows_filtered_position() {
        let page = build_page(
            view("stem"),
            vec![
                student("1", "Aquino", "Ben", Some("STEM"), true),
                student("2", "Bautista", "Cara", Some("STEM"), true),
            ],
            "bautista",
        );
        assert_eq!(page.total, 2);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].index, 1);
        assert_eq!(page.rows[0].four_ps, "No");
    }

    #[test]
    fn als_view_skips_grouping() {
        let page = build_page(
            view("als"),
            vec![
                student("1", "Lim", "Ria", Some(ALS_STRAND), true),
                student("2", "Go", "Tom", Some(ALS_STRAND), true),
            ],
            "",
        );
        assert_eq!(page.rows[0].display_name, "Go, Tom");
        assert_eq!(page.rows.len(), 2);
    }

    #[test]
    fn unknown_slug_has_no_view() {
        assert!(ListingView::by_slug("gas").is_none());
        assert_eq!(view("TVL-ICT").group_key, Some("TVL-ICT"));
    }

    #[tokio::test]
    async fn render_reads_only_enrolled_rows_of_the_scope() {
        let store = Arc::new(MemoryStudentStore::default());
        store
            .insert_raw(Track::General, student("1", "Cruz", "Ana", Some("STEM"), true))
            .await;
        store
            .insert_raw(Track::General, student("2", "Diaz", "Bo", Some("STEM"), false))
            .await;
        store
            .insert_raw(Track::Als, student("3", "Eala", "Cy", Some(ALS_STRAND), true))
            .await;

        let stem = StudentListing::new(view("stem"), store.clone());
        let page = stem.render("").await.unwrap();
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].lrn, "1");

        let als = StudentListing::new(view("als"), store);
        let page = als.render("").await.unwrap();
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].lrn, "3");
    }
}
