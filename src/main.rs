mod assess;
mod config;
mod eligibility;
mod error;
mod models;
mod propagate;
mod questions;
mod report;
mod roster;
mod store;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use models::{ArrearsLimit, PracticeProblem, Submission};
use propagate::{CompanyEdit, NewCompany, OffCampusPlacement, PushTo, RejectionReview, Selection};
use roster::{FilterQuery, OnboardingProfile, ProfileUpdate};
use store::Store;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "placecell")]
#[command(about = "Campus placement cell - students, drives, placements, and reports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the document store
    Init,

    /// Manage the student roster
    Student {
        #[command(subcommand)]
        command: StudentCommands,
    },

    /// Manage recruiting companies
    Company {
        #[command(subcommand)]
        command: CompanyCommands,
    },

    /// Record a student's willingness for a drive
    Apply {
        /// Register number
        reg: String,

        /// Company name
        company: String,

        /// Declare the student not willing
        #[arg(long)]
        not_willing: bool,
    },

    /// Record a selection
    Select {
        /// Register number
        reg: String,

        /// Company name
        company: String,

        /// Offered role
        #[arg(short, long)]
        role: String,

        /// Offered CTC
        #[arg(short, long)]
        ctc: String,

        /// Offer image URL
        #[arg(short, long)]
        image_url: String,
    },

    /// Record a rejection review
    Reject {
        /// Register number
        reg: String,

        /// Company name
        company: String,

        /// Round the student was rejected in
        #[arg(long)]
        round: String,

        /// Student asked for training
        #[arg(long)]
        need_training: bool,
    },

    /// Feedback pushes and their status
    Feedback {
        #[command(subcommand)]
        command: FeedbackCommands,
    },

    /// Off-campus placements
    Offcampus {
        #[command(subcommand)]
        command: OffcampusCommands,
    },

    /// Record whether a student accepted an offer
    Offer {
        /// Register number
        reg: String,

        /// Company name
        company: String,

        /// The offer was declined
        #[arg(long)]
        declined: bool,

        /// Reason for declining
        #[arg(long)]
        reason: Option<String>,
    },

    /// Placement reports
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },

    /// Timed tests
    Test {
        #[command(subcommand)]
        command: TestCommands,
    },

    /// Practice problems
    Practice {
        #[command(subcommand)]
        command: PracticeCommands,
    },

    /// Crowd-sourced interview questions
    Question {
        #[command(subcommand)]
        command: QuestionCommands,
    },

    /// Open or close the CGPA edit gate
    CgpaEdit {
        /// "on" or "off"
        state: String,
    },
}

#[derive(Subcommand)]
enum StudentCommands {
    /// Create a bare roster record
    Onboard {
        /// Register number
        reg: String,

        /// Student name
        name: String,

        /// College email
        email: String,
    },

    /// Fill in the academic profile and finish onboarding
    Complete {
        reg: String,

        #[arg(long)]
        roll_no: String,

        #[arg(long)]
        mobile: String,

        #[arg(long)]
        tenth: String,

        /// Diploma / 12th percentage
        #[arg(long)]
        twelfth: String,

        #[arg(long)]
        diploma: bool,

        #[arg(long)]
        cgpa: String,

        #[arg(long)]
        history_of_arrears: String,

        #[arg(long)]
        current_backlogs: String,

        #[arg(long)]
        gender: String,

        #[arg(long)]
        skills: String,

        #[arg(long)]
        domain: String,
    },

    /// Show one student
    Show {
        reg: String,
    },

    /// Show a student's profile with their application state
    Summary {
        reg: String,
    },

    /// List the whole roster
    List,

    /// Students clearing academic thresholds
    Filter {
        #[arg(long, default_value = "0")]
        min_cgpa: f64,

        #[arg(long, default_value = "0")]
        max_history: i64,

        #[arg(long, default_value = "0")]
        max_backlogs: i64,

        /// Minimum 10th percentage
        #[arg(long)]
        min_tenth: Option<f64>,

        /// Minimum diploma / 12th percentage
        #[arg(long)]
        min_twelfth: Option<f64>,
    },

    /// Students who have not filled in a profile field
    Missing {
        /// Resume, LinkedIn, Github, History of Arrears or Current Backlogs
        field: String,
    },

    /// List mentors
    Mentors,

    /// Mark or unmark a student as mentor
    SetMentor {
        reg: String,

        #[arg(long)]
        off: bool,
    },

    /// Update profile links and contact fields
    Update {
        reg: String,

        #[arg(long)]
        resume: Option<String>,

        #[arg(long)]
        github: Option<String>,

        #[arg(long)]
        linkedin: Option<String>,

        #[arg(long)]
        mobile: Option<String>,

        #[arg(long)]
        skills: Option<String>,

        #[arg(long)]
        domain: Option<String>,

        #[arg(long)]
        other_domain: Option<String>,

        /// Requires the CGPA edit gate to be open
        #[arg(long)]
        cgpa: Option<String>,
    },

    /// Set a student's gender
    SetGender {
        reg: String,
        gender: String,
    },
}

#[derive(Subcommand)]
enum CompanyCommands {
    /// Post a new drive
    Add {
        name: String,

        #[arg(short, long)]
        role: String,

        #[arg(short, long)]
        ctc: String,

        /// Minimum CGPA
        #[arg(long, default_value = "0")]
        criteria: String,

        /// Drive date (YYYY-MM-DD or RFC 3339)
        #[arg(short, long)]
        date: Option<String>,

        /// Company type (Product, Service, ...)
        #[arg(short, long, default_value = "")]
        r#type: String,

        /// Application link
        #[arg(short, long, default_value = "")]
        link: String,

        /// Max history of arrears; omit for no limit
        #[arg(long)]
        max_history: Option<i64>,

        /// Max standing arrears; omit for no limit
        #[arg(long)]
        max_backlogs: Option<i64>,

        /// Restrict the drive to one gender
        #[arg(long)]
        gender: Option<String>,
    },

    /// Edit an existing drive
    Edit {
        /// Company document id
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        role: Option<String>,

        #[arg(long)]
        ctc: Option<String>,

        #[arg(long)]
        criteria: Option<String>,

        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        link: Option<String>,

        #[arg(long)]
        max_history: Option<i64>,

        #[arg(long)]
        max_backlogs: Option<i64>,
    },

    /// List every company
    List,

    /// Drives that have not happened yet
    Upcoming {
        /// Restrict to drives this student is eligible for
        #[arg(long)]
        reg: Option<String>,
    },

    /// Drives whose date has passed
    Previous,

    /// Has this student applied to this company?
    Applied {
        reg: String,
        company: String,
    },
}

#[derive(Subcommand)]
enum FeedbackCommands {
    /// Ask students for feedback on a drive
    Push {
        company: String,

        /// "all" or "applicants"
        #[arg(long, default_value = "applicants")]
        to: String,
    },

    /// Companies waiting on this student's feedback
    Pending {
        reg: String,
    },

    /// Companies that have never pushed feedback
    Unpushed,
}

#[derive(Subcommand)]
enum OffcampusCommands {
    /// Record an off-campus placement
    Add {
        reg: String,
        company: String,

        #[arg(short, long)]
        role: String,

        #[arg(short, long)]
        ctc: String,

        #[arg(short, long)]
        date: Option<String>,

        #[arg(long)]
        offer_letter_url: Option<String>,

        #[arg(long)]
        image_url: Option<String>,

        #[arg(long)]
        r#type: Option<String>,
    },

    /// Rewrite the terms of every placement under a company
    Edit {
        company: String,

        #[arg(short, long)]
        role: String,

        #[arg(short, long)]
        ctc: String,

        #[arg(short, long)]
        date: String,
    },

    /// Remove one off-campus placement
    Delete {
        reg: String,
        company: String,
    },
}

#[derive(Subcommand)]
enum ReportCommands {
    /// All placements, optionally narrowed to a company, student or window
    Placed {
        #[arg(long)]
        company: Option<String>,

        #[arg(long)]
        reg: Option<String>,

        #[arg(long)]
        from: Option<String>,

        #[arg(long)]
        to: Option<String>,
    },

    /// Placement counts per calendar month
    Monthly,

    /// How many rejected students asked for training
    Training,

    /// Export the willing list for a company with student details
    Willing {
        company: String,

        /// Comma-separated student fields to include
        #[arg(long, default_value = "Name")]
        fields: String,
    },
}

#[derive(Subcommand)]
enum TestCommands {
    /// Schedule a timed test
    Create {
        id: String,

        /// Question-bank problem ids
        #[arg(required = true)]
        problems: Vec<String>,

        /// Due time (YYYY-MM-DD or RFC 3339)
        #[arg(short, long)]
        due: String,
    },

    /// List every test
    List,

    /// Tests still open for submission
    Active,

    /// Show one test with its problems
    Show {
        id: String,
    },

    /// Record a submission
    Submit {
        id: String,
        reg: String,

        #[arg(short, long)]
        problem: String,

        #[arg(short, long)]
        score: f64,
    },

    /// List the question bank
    Problems,
}

#[derive(Subcommand)]
enum QuestionCommands {
    /// Contribute an interview question
    Add {
        /// Contributor's register number
        reg: String,

        company: String,

        #[arg(short, long)]
        question: String,

        #[arg(short, long, default_value = "")]
        solution: String,

        #[arg(short, long, default_value = "")]
        year: String,

        #[arg(short, long, default_value = "")]
        round: String,

        /// Comma-separated tags
        #[arg(short, long, default_value = "")]
        tags: String,

        #[arg(long, default_value = "")]
        links: String,

        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Questions for one company
    Search {
        company: String,
    },

    /// The whole question bank
    List,

    /// Show one question
    Show {
        id: String,
    },

    /// Rewrite a question
    Update {
        id: String,

        /// Contributor's register number
        reg: String,

        company: String,

        #[arg(short, long)]
        question: String,

        #[arg(short, long, default_value = "")]
        solution: String,

        #[arg(short, long, default_value = "")]
        year: String,

        #[arg(short, long, default_value = "")]
        round: String,

        #[arg(short, long, default_value = "")]
        tags: String,

        #[arg(long, default_value = "")]
        links: String,

        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Delete a question
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
enum PracticeCommands {
    /// Add a practice problem
    Add {
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,

        #[arg(long, default_value = "")]
        sample_input: String,

        #[arg(long, default_value = "")]
        sample_output: String,

        #[arg(short, long, default_value = "")]
        link: String,

        #[arg(long, default_value = "")]
        hint: String,
    },

    /// List practice problems
    List,
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("cannot parse date '{raw}' (expected YYYY-MM-DD or RFC 3339)"))?;
    Ok(date
        .and_hms_opt(0, 0, 0)
        .context("invalid date")?
        .and_utc())
}

fn arrears_arg(limit: Option<i64>) -> ArrearsLimit {
    match limit {
        Some(n) => ArrearsLimit::AtMost(n),
        None => ArrearsLimit::NotMentioned,
    }
}

fn fmt_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_students(students: &[models::Student]) {
    println!(
        "{:<14} {:<22} {:<7} {:<8} {:<9} {:<8}",
        "REG", "NAME", "CGPA", "HISTORY", "BACKLOGS", "MENTOR"
    );
    println!("{}", "-".repeat(72));
    for s in students {
        println!(
            "{:<14} {:<22} {:<7} {:<8} {:<9} {:<8}",
            truncate(&s.register_number, 12),
            truncate(&s.name, 20),
            s.cgpa,
            s.history_of_arrears,
            s.current_backlogs,
            if s.is_mentor == 1 { "yes" } else { "" }
        );
    }
}

fn print_questions(rows: &[(String, models::CompanyQuestion)]) {
    println!(
        "{:<22} {:<18} {:<12} {:<34}",
        "ID", "COMPANY", "ROUND", "QUESTION"
    );
    println!("{}", "-".repeat(88));
    for (id, q) in rows {
        println!(
            "{:<22} {:<18} {:<12} {:<34}",
            truncate(id, 20),
            truncate(&q.company_name, 16),
            truncate(&q.round, 10),
            truncate(&q.question, 32)
        );
    }
}

fn print_companies(companies: &[(String, models::Company)]) {
    println!(
        "{:<22} {:<22} {:<18} {:<10} {:<8} {:<12}",
        "ID", "NAME", "ROLE", "CTC", "CUTOFF", "DATE"
    );
    println!("{}", "-".repeat(96));
    for (id, c) in companies {
        println!(
            "{:<22} {:<22} {:<18} {:<10} {:<8} {:<12}",
            truncate(id, 20),
            truncate(&c.name, 20),
            truncate(&c.role, 16),
            truncate(&c.ctc, 8),
            c.criteria,
            fmt_date(c.date)
        );
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let store = Store::open(&config::store_path())?;

    match cli.command {
        Commands::Init => {
            println!("Store initialized at {}", config::store_path().display());
        }

        Commands::Student { command } => match command {
            StudentCommands::Onboard { reg, name, email } => {
                let id = roster::onboard_student(&store, &reg, &name, &email)?;
                println!("Onboarded {} ({})", reg, id);
            }

            StudentCommands::Complete {
                reg,
                roll_no,
                mobile,
                tenth,
                twelfth,
                diploma,
                cgpa,
                history_of_arrears,
                current_backlogs,
                gender,
                skills,
                domain,
            } => {
                roster::complete_onboarding(
                    &store,
                    OnboardingProfile {
                        register_number: reg.clone(),
                        roll_no,
                        mobile_number: mobile,
                        tenth_percent: tenth,
                        diploma_percent: twelfth,
                        is_diploma: diploma,
                        cgpa,
                        history_of_arrears,
                        current_backlogs,
                        gender,
                        skill_set: skills,
                        domain,
                    },
                )?;
                println!("Onboarding completed for {}", reg);
            }

            StudentCommands::Show { reg } => {
                let s = roster::get_student(&store, &reg)?;
                println!("{} ({})", s.name, s.register_number);
                println!("Email: {}", s.email);
                println!("CGPA: {}", s.cgpa);
                println!("History of arrears: {}", s.history_of_arrears);
                println!("Current backlogs: {}", s.current_backlogs);
                if let Some(gender) = &s.gender {
                    println!("Gender: {}", gender);
                }
                if !s.resume.is_empty() {
                    println!("Resume: {}", s.resume);
                }
                if !s.skill_set.is_empty() {
                    println!("Skills: {}", s.skill_set);
                }
            }

            StudentCommands::Summary { reg } => {
                let summary = report::student_summary(&store, &reg)?;
                println!("{} ({})", summary.student.name, summary.student.register_number);
                println!("CGPA: {}", summary.student.cgpa);
                if summary.tracking.status.is_empty() {
                    println!("\nNo applications.");
                } else {
                    println!("\nApplications:");
                    for (company, willing) in &summary.tracking.status {
                        println!(
                            "  {} - {}",
                            company,
                            if *willing { "willing" } else { "not willing" }
                        );
                    }
                }
                if !summary.tracking.placed.is_empty() {
                    println!("\nPlacements:");
                    for (company, p) in &summary.tracking.placed {
                        println!("  {} - {} @ {}", company, p.role, p.ctc);
                    }
                }

                let dues = report::completion_summary(&store, &reg)?;
                println!(
                    "\nFeedback: {}/{} completed. Tests taken: {}.",
                    dues.feedback_completed, dues.feedback_requested, dues.tests_taken
                );
            }

            StudentCommands::List => {
                let students = roster::all_students(&store)?;
                if students.is_empty() {
                    println!("No students on the roster.");
                } else {
                    print_students(&students);
                }
            }

            StudentCommands::Filter {
                min_cgpa,
                max_history,
                max_backlogs,
                min_tenth,
                min_twelfth,
            } => {
                let students = roster::filter_students(
                    &store,
                    &FilterQuery {
                        min_cgpa,
                        max_history_of_arrears: max_history,
                        max_current_backlogs: max_backlogs,
                        min_tenth_percent: min_tenth,
                        min_twelfth_percent: min_twelfth,
                    },
                )?;
                print_students(&students);
            }

            StudentCommands::Missing { field } => {
                let students = roster::missing_field(&store, &field)?;
                print_students(&students);
            }

            StudentCommands::Mentors => {
                let students = roster::mentors(&store)?;
                print_students(&students);
            }

            StudentCommands::SetMentor { reg, off } => {
                roster::set_mentor(&store, &reg, !off)?;
                println!(
                    "{} is {} a mentor.",
                    reg,
                    if off { "no longer" } else { "now" }
                );
            }

            StudentCommands::Update {
                reg,
                resume,
                github,
                linkedin,
                mobile,
                skills,
                domain,
                other_domain,
                cgpa,
            } => {
                roster::update_profile(
                    &store,
                    &reg,
                    ProfileUpdate {
                        resume,
                        github,
                        linkedin,
                        mobile_number: mobile,
                        skill_set: skills,
                        domain,
                        other_interested_domain: other_domain,
                        cgpa,
                    },
                )?;
                println!("Updated {}", reg);
            }

            StudentCommands::SetGender { reg, gender } => {
                roster::update_gender(&store, &reg, &gender)?;
                println!("Updated {}", reg);
            }
        },

        Commands::Company { command } => match command {
            CompanyCommands::Add {
                name,
                role,
                ctc,
                criteria,
                date,
                r#type,
                link,
                max_history,
                max_backlogs,
                gender,
            } => {
                let date = date.as_deref().map(parse_date).transpose()?;
                let id = propagate::add_company(
                    &store,
                    NewCompany {
                        name: name.clone(),
                        date,
                        ctc,
                        criteria,
                        company_type: r#type,
                        role,
                        link,
                        image_urls: Vec::new(),
                        max_history_of_arrears: arrears_arg(max_history),
                        max_standing_arrears: arrears_arg(max_backlogs),
                        gender,
                    },
                )?;
                println!("Added '{}' ({})", name, id);
            }

            CompanyCommands::Edit {
                id,
                name,
                role,
                ctc,
                criteria,
                date,
                link,
                max_history,
                max_backlogs,
            } => {
                let date = date.as_deref().map(parse_date).transpose()?;
                propagate::edit_company(
                    &store,
                    &id,
                    CompanyEdit {
                        name,
                        date,
                        role,
                        criteria,
                        ctc,
                        link,
                        max_history_of_arrears: max_history.map(ArrearsLimit::AtMost),
                        max_standing_arrears: max_backlogs.map(ArrearsLimit::AtMost),
                    },
                )?;
                println!("Updated company {}", id);
            }

            CompanyCommands::List => {
                let companies = roster::all_companies(&store)?;
                if companies.is_empty() {
                    println!("No companies.");
                } else {
                    print_companies(&companies);
                }
            }

            CompanyCommands::Upcoming { reg } => match reg {
                Some(reg) => {
                    let listings = roster::upcoming_for_student(&store, &reg, Utc::now())?;
                    if listings.is_empty() {
                        println!("No eligible upcoming drives for {}.", reg);
                    } else {
                        println!(
                            "{:<22} {:<18} {:<10} {:<12} {:>8} {:<8}",
                            "NAME", "ROLE", "CTC", "DATE", "WILLING", "APPLIED"
                        );
                        println!("{}", "-".repeat(82));
                        for l in listings {
                            println!(
                                "{:<22} {:<18} {:<10} {:<12} {:>8} {:<8}",
                                truncate(&l.company.name, 20),
                                truncate(&l.company.role, 16),
                                truncate(&l.company.ctc, 8),
                                fmt_date(l.company.date),
                                l.willing_count,
                                if l.has_applied { "yes" } else { "" }
                            );
                        }
                    }
                }
                None => {
                    let companies = roster::upcoming_companies(&store, Utc::now())?;
                    if companies.is_empty() {
                        println!("No upcoming drives.");
                    } else {
                        let rows: Vec<_> =
                            companies.into_iter().map(|c| (String::new(), c)).collect();
                        print_companies(&rows);
                    }
                }
            },

            CompanyCommands::Previous => {
                let companies = roster::previous_companies(&store, Utc::now())?;
                if companies.is_empty() {
                    println!("No previous drives.");
                } else {
                    let rows: Vec<_> = companies.into_iter().map(|c| (String::new(), c)).collect();
                    print_companies(&rows);
                }
            }

            CompanyCommands::Applied { reg, company } => {
                if roster::has_applied(&store, &reg, &company)? {
                    println!("{} has applied to {}.", reg, company);
                } else {
                    println!("{} has not applied to {}.", reg, company);
                }
            }
        },

        Commands::Apply {
            reg,
            company,
            not_willing,
        } => {
            propagate::declare_willingness(&store, &reg, &company, !not_willing)?;
            println!(
                "Recorded {} as {} for {}.",
                reg,
                if not_willing { "not willing" } else { "willing" },
                company
            );
        }

        Commands::Select {
            reg,
            company,
            role,
            ctc,
            image_url,
        } => {
            propagate::confirm_selection(
                &store,
                Selection {
                    register_number: reg.clone(),
                    company_name: company.clone(),
                    role,
                    ctc,
                    image_url,
                },
            )?;
            println!("Recorded selection of {} at {}.", reg, company);
        }

        Commands::Reject {
            reg,
            company,
            round,
            need_training,
        } => {
            propagate::record_rejection_review(
                &store,
                RejectionReview {
                    register_number: reg.clone(),
                    company_name: company.clone(),
                    need_training,
                    rejected_round: round,
                },
            )?;
            println!("Recorded rejection review for {} at {}.", reg, company);
        }

        Commands::Feedback { command } => match command {
            FeedbackCommands::Push { company, to } => {
                let push_to: PushTo = to.parse()?;
                propagate::push_feedback(&store, &company, push_to)?;
                println!("Feedback requested for {}.", company);
            }

            FeedbackCommands::Pending { reg } => {
                let companies = report::pending_feedback(&store, &reg)?;
                println!("Pending feedback for {}:", reg);
                for name in companies {
                    println!("  {}", name);
                }
            }

            FeedbackCommands::Unpushed => {
                let companies = report::companies_without_feedback_push(&store)?;
                println!("Companies with no feedback push:");
                for name in companies {
                    println!("  {}", name);
                }
            }
        },

        Commands::Offcampus { command } => match command {
            OffcampusCommands::Add {
                reg,
                company,
                role,
                ctc,
                date,
                offer_letter_url,
                image_url,
                r#type,
            } => {
                let date = date.as_deref().map(parse_date).transpose()?;
                propagate::add_off_campus(
                    &store,
                    OffCampusPlacement {
                        register_number: reg.clone(),
                        company_name: company.clone(),
                        role,
                        ctc,
                        date,
                        offer_letter_url,
                        image_url,
                        company_type: r#type,
                    },
                )?;
                println!("Recorded off-campus placement of {} at {}.", reg, company);
            }

            OffcampusCommands::Edit {
                company,
                role,
                ctc,
                date,
            } => {
                let date = parse_date(&date)?;
                let updated = propagate::edit_off_campus(&store, &company, &role, &ctc, date)?;
                println!("Rewrote {} tracking record(s) for {}.", updated, company);
            }

            OffcampusCommands::Delete { reg, company } => {
                propagate::delete_off_campus(&store, &reg, &company)?;
                println!("Deleted off-campus placement of {} at {}.", reg, company);
            }
        },

        Commands::Offer {
            reg,
            company,
            declined,
            reason,
        } => {
            propagate::record_offer_acceptance(
                &store,
                &reg,
                &company,
                !declined,
                reason.as_deref(),
            )?;
            println!(
                "Recorded offer {} by {} for {}.",
                if declined { "declined" } else { "accepted" },
                reg,
                company
            );
        }

        Commands::Report { command } => match command {
            ReportCommands::Placed {
                company,
                reg,
                from,
                to,
            } => {
                if let Some(company) = company {
                    let placed = report::placed_for_company(&store, &company)?;
                    if placed.is_empty() {
                        println!("No placements at {}.", company);
                    } else {
                        for (reg, p) in placed {
                            println!("{:<14} {} @ {}", reg, p.role, p.ctc);
                        }
                    }
                } else if let Some(reg) = reg {
                    for (company, p) in report::placed_for_student(&store, &reg)? {
                        println!("{:<22} {} @ {}", company, p.role, p.ctc);
                    }
                } else {
                    let rows = match (from, to) {
                        (Some(from), Some(to)) => {
                            report::placed_in_window(&store, parse_date(&from)?, parse_date(&to)?)?
                        }
                        _ => report::placed_all(&store)?,
                    };
                    if rows.is_empty() {
                        println!("No placements.");
                    } else {
                        println!(
                            "{:<14} {:<22} {:<18} {:<10} {:<12}",
                            "REG", "COMPANY", "ROLE", "CTC", "DATE"
                        );
                        println!("{}", "-".repeat(78));
                        for row in rows {
                            println!(
                                "{:<14} {:<22} {:<18} {:<10} {:<12}",
                                truncate(&row.register_number, 12),
                                truncate(&row.company, 20),
                                truncate(&row.placement.role, 16),
                                truncate(&row.placement.ctc, 8),
                                fmt_date(row.placement.date)
                            );
                        }
                    }
                }
            }

            ReportCommands::Monthly => {
                let buckets = report::placements_by_month(&store)?;
                if buckets.is_empty() {
                    println!("No dated placements.");
                } else {
                    for (label, count) in buckets {
                        println!("{}: {}", label, count);
                    }
                }
            }

            ReportCommands::Training => {
                let counts = report::training_need_counts(&store)?;
                if counts.is_empty() {
                    println!("No rejection feedback recorded.");
                } else {
                    println!("{:<22} {:>14} {:>12}", "COMPANY", "NEED TRAINING", "NO TRAINING");
                    println!("{}", "-".repeat(50));
                    for (company, c) in counts {
                        println!(
                            "{:<22} {:>14} {:>12}",
                            truncate(&company, 20),
                            c.need_training,
                            c.no_training
                        );
                    }
                }
            }

            ReportCommands::Willing { company, fields } => {
                let fields: Vec<&str> =
                    fields.split(',').map(str::trim).filter(|f| !f.is_empty()).collect();
                let rows = report::willing_students(&store, &company, &fields)?;
                if rows.is_empty() {
                    println!("No willing students for {}.", company);
                } else {
                    println!("Willing students for {} ({}):", company, rows.len());
                    for row in rows {
                        let reg = row["Register Number"].as_str().unwrap_or("?");
                        let rest: Vec<String> = fields
                            .iter()
                            .filter_map(|f| row.get(*f))
                            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                            .collect();
                        println!("  {:<14} {}", reg, rest.join("  "));
                    }
                }
            }
        },

        Commands::Test { command } => match command {
            TestCommands::Create { id, problems, due } => {
                let due = parse_date(&due)?;
                assess::create_test(&store, &id, problems, due)?;
                println!("Created test '{}'.", id);
            }

            TestCommands::List => {
                let tests = assess::all_tests(&store)?;
                if tests.is_empty() {
                    println!("No tests.");
                } else {
                    println!("{:<20} {:<10} {:<20} {:>12}", "ID", "PROBLEMS", "DUE", "SUBMITTERS");
                    println!("{}", "-".repeat(64));
                    for (id, test) in tests {
                        println!(
                            "{:<20} {:<10} {:<20} {:>12}",
                            truncate(&id, 18),
                            test.number_of_problems,
                            test.due_time.format("%Y-%m-%d %H:%M"),
                            test.completion_status.len()
                        );
                    }
                }
            }

            TestCommands::Active => {
                let tests = assess::active_tests(&store, Utc::now())?;
                if tests.is_empty() {
                    println!("No active tests.");
                } else {
                    for (id, test) in tests {
                        println!("{} (due {})", id, test.due_time.format("%Y-%m-%d %H:%M"));
                    }
                }
            }

            TestCommands::Show { id } => {
                let (test, problems) = assess::test_with_problems(&store, &id)?;
                println!("Test '{}'", id);
                println!("Due: {}", test.due_time.format("%Y-%m-%d %H:%M"));
                println!("Problems ({}):", problems.len());
                for p in &problems {
                    let name = p.get("problemName").and_then(|v| v.as_str()).unwrap_or("?");
                    println!("  {}", name);
                }
                if !test.completion_status.is_empty() {
                    println!("\nSubmissions:");
                    for (reg, attempts) in &test.completion_status {
                        let best = attempts
                            .iter()
                            .map(|a| a.score)
                            .fold(f64::NEG_INFINITY, f64::max);
                        println!("  {:<14} {} attempt(s), best {:.1}", reg, attempts.len(), best);
                    }
                }
            }

            TestCommands::Submit {
                id,
                reg,
                problem,
                score,
            } => {
                assess::record_submission(
                    &store,
                    &id,
                    &reg,
                    Submission {
                        score,
                        completed_time: Utc::now(),
                        problem_ids: problem,
                    },
                )?;
                println!("Recorded submission by {} for '{}'.", reg, id);
            }

            TestCommands::Problems => {
                let rows = assess::test_problems(&store)?;
                println!("{:<22} {:<30} {:<14} {:<10}", "ID", "NAME", "TOPIC", "DIFFICULTY");
                println!("{}", "-".repeat(78));
                for row in rows {
                    println!(
                        "{:<22} {:<30} {:<14} {:<10}",
                        truncate(&row.id, 20),
                        truncate(&row.problem_name, 28),
                        truncate(&row.topic, 12),
                        row.difficulty
                    );
                }
            }
        },

        Commands::Practice { command } => match command {
            PracticeCommands::Add {
                name,
                description,
                sample_input,
                sample_output,
                link,
                hint,
            } => {
                let id = assess::add_practice_problem(
                    &store,
                    &PracticeProblem {
                        problem_name: name.clone(),
                        problem_description: description,
                        sample_input,
                        sample_output,
                        link,
                        hint,
                        ..Default::default()
                    },
                )?;
                println!("Added practice problem '{}' ({})", name, id);
            }

            PracticeCommands::List => {
                let problems = assess::practice_problems(&store)?;
                println!("{:<22} {:<40}", "ID", "NAME");
                println!("{}", "-".repeat(64));
                for (id, p) in problems {
                    println!("{:<22} {:<40}", truncate(&id, 20), truncate(&p.problem_name, 38));
                }
            }
        },

        Commands::Question { command } => match command {
            QuestionCommands::Add {
                reg,
                company,
                question,
                solution,
                year,
                round,
                tags,
                links,
                notes,
            } => {
                let id = questions::add_question(
                    &store,
                    questions::NewQuestion {
                        company_name: company.clone(),
                        year,
                        round,
                        question,
                        solution,
                        tags,
                        external_links: links,
                        additional_notes: notes,
                        register_number: reg,
                    },
                )?;
                println!("Added question for {} ({})", company, id);
            }

            QuestionCommands::Search { company } => {
                let rows = questions::search_questions(&store, Some(&company))?;
                print_questions(&rows);
            }

            QuestionCommands::List => {
                let rows = questions::all_questions(&store)?;
                print_questions(&rows);
            }

            QuestionCommands::Show { id } => {
                let q = questions::get_question(&store, &id)?;
                println!("{} ({} {})", q.company_name, q.round, q.year);
                println!("Asked by: {}", q.register_number);
                if !q.tags.is_empty() {
                    println!("Tags: {}", q.tags.join(", "));
                }
                println!("\n{}", q.question);
                if !q.solution.is_empty() {
                    println!("\n--- Solution ---\n{}", q.solution);
                }
                if !q.external_links.is_empty() {
                    println!("\nLinks: {}", q.external_links);
                }
                if !q.additional_notes.is_empty() {
                    println!("Notes: {}", q.additional_notes);
                }
            }

            QuestionCommands::Update {
                id,
                reg,
                company,
                question,
                solution,
                year,
                round,
                tags,
                links,
                notes,
            } => {
                questions::update_question(
                    &store,
                    &id,
                    questions::NewQuestion {
                        company_name: company,
                        year,
                        round,
                        question,
                        solution,
                        tags,
                        external_links: links,
                        additional_notes: notes,
                        register_number: reg,
                    },
                )?;
                println!("Updated question {}", id);
            }

            QuestionCommands::Delete { id } => {
                questions::delete_question(&store, &id)?;
                println!("Deleted question {}", id);
            }
        },

        Commands::CgpaEdit { state } => {
            let allow = match state.as_str() {
                "on" => true,
                "off" => false,
                other => anyhow::bail!("expected 'on' or 'off', got '{}'", other),
            };
            roster::set_cgpa_edit(&store, allow)?;
            println!("CGPA edits are now {}.", if allow { "enabled" } else { "disabled" });
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
        // Multi-byte names must cut on character boundaries.
        assert_eq!(truncate("Müller-Lüdenscheidt", 10), "Müller-...");
        assert_eq!(truncate("संस्था", 10), "संस्था");
    }

    #[test]
    fn test_parse_date_accepts_both_formats() {
        assert_eq!(
            parse_date("2024-03-10").unwrap(),
            parse_date("2024-03-10T00:00:00Z").unwrap()
        );
        assert!(parse_date("10/03/2024").is_err());
    }
}
