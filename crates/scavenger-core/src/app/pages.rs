//! TaskListPages - `list_task_list` をページ単位でたどる
//!
//! 前回の cursor を渡して次のページを取る、有限で再開可能な列です。
//! 空の cursor が返ってきたら終わり。エラーのときは cursor を進めないので、
//! 同じ `TaskListPages`（または `resume`）からやり直せます。

use super::scavenger::Scavenger;
use crate::domain::{PageToken, ScavengerError, TaskListInfo};

pub struct TaskListPages<'a> {
    scavenger: &'a Scavenger,
    page_size: usize,
    cursor: PageToken,
    done: bool,
}

impl<'a> TaskListPages<'a> {
    pub fn new(scavenger: &'a Scavenger, page_size: usize) -> Self {
        Self::resume(scavenger, page_size, PageToken::start())
    }

    /// Continue from a cursor returned by [`cursor`](Self::cursor).
    pub fn resume(scavenger: &'a Scavenger, page_size: usize, cursor: PageToken) -> Self {
        Self {
            scavenger,
            page_size,
            cursor,
            done: false,
        }
    }

    /// Cursor of the next page to fetch.
    pub fn cursor(&self) -> &PageToken {
        &self.cursor
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// `Ok(None)` once the backend has returned an empty cursor.
    ///
    /// Pages may be empty while the cursor is not; callers just keep going.
    pub async fn next_page(&mut self) -> Result<Option<Vec<TaskListInfo>>, ScavengerError> {
        if self.done {
            return Ok(None);
        }
        let page = self
            .scavenger
            .list_task_list(self.page_size, self.cursor.clone())
            .await?;
        self.done = page.is_last();
        self.cursor = page.next_page_token;
        Ok(Some(page.items))
    }
}

impl Scavenger {
    pub fn task_list_pages(&self) -> TaskListPages<'_> {
        TaskListPages::new(self, self.config.task_list_page_size)
    }
}
