//! Reporting API endpoint URL builders

/// Hotel Ads reporting API root
pub const DEFAULT_API_BASE_URL: &str = "https://partner.api.bingads.microsoft.com/Travel/v1";

/// Build the job-creation URL for a customer/account pair
pub fn report_jobs_url(base_url: &str, customer_id: &str, account_id: &str) -> String {
    format!(
        "{}/Customers({})/Accounts({})/ReportJobs",
        base_url.trim_end_matches('/'),
        customer_id,
        account_id
    )
}

/// Build the status URL for one report job
pub fn report_job_url(base_url: &str, customer_id: &str, account_id: &str, job_id: &str) -> String {
    format!(
        "{}('{}')",
        report_jobs_url(base_url, customer_id, account_id),
        job_id
    )
}
